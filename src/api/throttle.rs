//! Minimum spacing between outbound requests

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests
///
/// Every request issued through the gateway passes through one throttle, so
/// the spacing holds process-wide even if several gateway methods interleave.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the minimum interval since the previous request has elapsed,
    /// then records the current time as the latest request
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let since = previous.elapsed();
            if since < self.min_interval {
                let delay = self.min_interval - since;
                tracing::trace!("Throttling request for {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        *last = Some(Instant::now());
    }
}
