//! Progress reporting and ETA estimation

use std::time::Duration;
use tokio::time::Instant;

/// Estimates the time left from the throughput so far
///
/// Returns `"Unknown"` when nothing has been processed yet or the rate is
/// zero. Otherwise the remaining time is expressed in whole seconds, minutes,
/// hours or days depending on its magnitude.
pub fn calculate_eta(elapsed: Duration, processed: u64, estimated_total: u64) -> String {
    if processed == 0 {
        return "Unknown".to_string();
    }

    let items_per_second = processed as f64 / elapsed.as_secs_f64();
    if items_per_second == 0.0 || !items_per_second.is_finite() {
        return "Unknown".to_string();
    }

    let remaining_items = estimated_total.saturating_sub(processed) as f64;
    format_remaining(remaining_items / items_per_second)
}

fn format_remaining(seconds_remaining: f64) -> String {
    if seconds_remaining < 60.0 {
        format!("{} seconds", seconds_remaining as u64)
    } else if seconds_remaining < 3600.0 {
        format!("{} minutes", (seconds_remaining / 60.0) as u64)
    } else if seconds_remaining < 86400.0 {
        format!("{} hours", (seconds_remaining / 3600.0) as u64)
    } else {
        format!("{} days", (seconds_remaining / 86400.0) as u64)
    }
}

/// Formats a run duration as `{h}h {m}m {s}s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
}

/// Tracks throughput for one crawl run
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    processed_this_run: u64,
    estimated_total: u64,
}

impl ProgressTracker {
    pub fn start(estimated_total: u64) -> Self {
        Self {
            started: Instant::now(),
            processed_this_run: 0,
            estimated_total,
        }
    }

    pub fn record(&mut self) {
        self.processed_this_run += 1;
    }

    pub fn processed_this_run(&self) -> u64 {
        self.processed_this_run
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// ETA for the remainder of the register
    ///
    /// The rate comes from this run only; `total_processed` includes entities
    /// counted by earlier runs and only shortens the remaining work.
    pub fn eta(&self, total_processed: u64) -> String {
        let remaining = self.estimated_total.saturating_sub(total_processed);
        calculate_eta(
            self.elapsed(),
            self.processed_this_run,
            remaining + self.processed_this_run,
        )
    }

    pub fn percent(&self, total_processed: u64) -> f64 {
        if self.estimated_total == 0 {
            return 0.0;
        }
        total_processed as f64 / self.estimated_total as f64 * 100.0
    }

    /// Logs the periodic progress line
    pub fn log(&self, total_processed: u64) {
        tracing::info!(
            "Progress: {}/{} companies processed (~{:.2}%). ETA: {}",
            total_processed,
            self.estimated_total,
            self.percent(total_processed),
            self.eta(total_processed)
        );
    }
}
