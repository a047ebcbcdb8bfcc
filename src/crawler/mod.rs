//! Crawler module for walking the company register
//!
//! This module contains the core crawling logic, including:
//! - The full-register crawl controller and its state machine
//! - Checkpoint persistence and resume pointers
//! - Bucket pagination and progress/ETA reporting
//! - Cooperative interrupt and resume signals
//! - Query and single-company modes

mod buckets;
mod checkpoint;
mod control;
mod controller;
mod progress;
mod query;
mod resume;

pub use buckets::{align_down, PageCursor};
pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStatus, CheckpointStore};
pub use control::{CrawlControl, PauseEnd, SharedControl};
pub use controller::{CrawlController, CrawlOutcome, OutcomeStatus};
pub use progress::{calculate_eta, format_duration, ProgressTracker};
pub use query::{scrape_by_query, scrape_company, search_paginated, QuerySummary};
pub use resume::{ResumePointer, ResumeThreshold};

use crate::api::ApiError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that end a crawl run
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Stopped by an interrupt; the checkpoint was written first
    #[error("Crawl interrupted after {total_processed} companies")]
    Interrupted { total_processed: u64 },

    /// A fatal error at a known position; the checkpoint was written first
    #[error("Crawl failed in bucket '{bucket}' at index {index}: {source}")]
    Failed {
        bucket: String,
        index: u64,
        #[source]
        source: Box<CrawlError>,
    },

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl CrawlError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// The API error at the root of this failure, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            Self::Failed { source, .. } => source.api_error(),
            _ => None,
        }
    }
}
