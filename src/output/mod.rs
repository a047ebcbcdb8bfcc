//! Output module for exports and reports
//!
//! This module handles:
//! - Flattening persisted entity documents into CSV files
//! - Summarising what the data directory holds

mod csv_export;
pub mod stats;

pub use csv_export::{export_to_csv, ExportSummary, COMPANIES_CSV, FILINGS_CSV, OFFICERS_CSV};
pub use stats::{load_statistics, print_statistics, RepositoryStatistics};

use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while exporting
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
