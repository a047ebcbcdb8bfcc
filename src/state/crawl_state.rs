/// Crawl state definitions for the controller's state machine
///
/// This module defines every state the crawl controller can be in, and which
/// moves between them are legal.
use std::fmt;

/// Represents the current state of a crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    // ===== Initial State =====
    /// Controller created, nothing fetched yet
    Idle,

    // ===== Active States =====
    /// Starting the bucket at this index
    EnumeratingBucket { bucket_index: usize },

    /// Fetching the search page at `offset` within the bucket
    FetchingPage { bucket_index: usize, offset: u64 },

    /// Handling the item at absolute position `index` within the bucket
    ProcessingEntity { bucket_index: usize, index: u64 },

    /// Suspended because free disk space fell below the threshold
    PausedLowDisk,

    // ===== Terminal States =====
    /// Every bucket exhausted, or the entity cap was reached
    Completed,

    /// Stopped by an external interrupt
    Interrupted,

    /// Stopped by an unrecoverable error
    Failed,
}

impl CrawlState {
    /// Returns true if this is a terminal state (the run is over)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Interrupted | Self::Failed)
    }

    /// Returns true while the controller is making progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::EnumeratingBucket { .. }
                | Self::FetchingPage { .. }
                | Self::ProcessingEntity { .. }
        )
    }

    /// Checks whether moving from this state to `next` is a legal transition
    pub fn can_transition_to(&self, next: &CrawlState) -> bool {
        if self.is_terminal() || *next == Self::Idle {
            return false;
        }

        match self {
            Self::Idle => matches!(
                next,
                Self::EnumeratingBucket { .. } | Self::Completed | Self::Interrupted
            ),
            Self::EnumeratingBucket { .. } => matches!(
                next,
                Self::FetchingPage { .. } | Self::Completed | Self::Interrupted
            ),
            _ => true,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::EnumeratingBucket { .. } => "enumerating_bucket",
            Self::FetchingPage { .. } => "fetching_page",
            Self::ProcessingEntity { .. } => "processing_entity",
            Self::PausedLowDisk => "paused_low_disk",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnumeratingBucket { bucket_index } => {
                write!(f, "{}({})", self.name(), bucket_index)
            }
            Self::FetchingPage {
                bucket_index,
                offset,
            } => write!(f, "{}({}, {})", self.name(), bucket_index, offset),
            Self::ProcessingEntity {
                bucket_index,
                index,
            } => write!(f, "{}({}, {})", self.name(), bucket_index, index),
            _ => f.write_str(self.name()),
        }
    }
}
