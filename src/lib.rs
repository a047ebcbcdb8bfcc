//! Registry-Crawl: a resumable company register harvester
//!
//! This crate walks a public company registry's REST API alphabetically,
//! fetching every company's profile, officers and filing history, persisting
//! them as JSON documents and flattening them into CSV exports. The crawl is
//! rate limited, checkpointed and resumable.

pub mod api;
pub mod config;
pub mod crawler;
pub mod monitor;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Registry-Crawl operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] crawler::CheckpointError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] crawler::CrawlError),

    #[error("Resource monitor error: {0}")]
    Monitor(#[from] monitor::MonitorError),

    #[error("Export error: {0}")]
    Export(#[from] output::ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Registry-Crawl operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use api::{ApiError, EntityRecord, Gateway};
pub use config::Config;
pub use crawler::{CrawlControl, CrawlController, CrawlOutcome};
pub use state::CrawlState;
pub use storage::{Category, JsonRepository, Repository};
