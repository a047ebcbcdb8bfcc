//! Cooperative control of a running crawl
//!
//! A [`CrawlControl`] is shared between the controller and whatever receives
//! operator signals. Interrupts are observed between entities and between
//! pages, and cut a rate-limit back-off short. A resume request releases a
//! low-disk pause.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a crawl control.
pub type SharedControl = Arc<CrawlControl>;

/// How a low-disk pause ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseEnd {
    Resumed,
    Interrupted,
}

/// Interrupt and resume signals for one crawl.
#[derive(Debug, Default)]
pub struct CrawlControl {
    interrupted: AtomicBool,
    resume_requested: AtomicBool,
    notify: Notify,
}

impl CrawlControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared control wrapped in [`Arc`].
    pub fn shared() -> SharedControl {
        Arc::new(Self::new())
    }

    /// Request the crawl to stop at the next safe point.
    pub fn interrupt(&self) {
        if !self.interrupted.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Release a low-disk pause. A request made while not paused is kept
    /// until the next pause begins.
    pub fn resume(&self) {
        self.resume_requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Forget any resume request made before the current pause.
    pub fn clear_resume(&self) {
        self.resume_requested.store(false, Ordering::SeqCst);
    }

    /// Wait until an interrupt is requested.
    pub async fn wait_for_interrupt(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_interrupted() {
                return;
            }

            notified.await;
        }
    }

    /// Wait until either a resume or an interrupt is requested.
    ///
    /// An interrupt wins over a pending resume.
    pub async fn wait_for_resume(&self) -> PauseEnd {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_interrupted() {
                return PauseEnd::Interrupted;
            }
            if self.resume_requested.swap(false, Ordering::SeqCst) {
                return PauseEnd::Resumed;
            }

            notified.await;
        }
    }
}
