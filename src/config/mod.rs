//! Configuration module for Registry-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so a crawl can run without a file at all; the
//! resulting [`Config`] is built once at startup and passed by reference into
//! the gateway and the controller.
//!
//! # Example
//!
//! ```no_run
//! use registry_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("registry.toml")).unwrap();
//! println!("Page size: {}", config.crawl.page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_buckets, ApiConfig, ApiEnvironment, Config, CrawlConfig, OutputConfig,
    CHECKPOINT_FILE_NAME, LIVE_BASE_URL, TEST_BASE_URL,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
