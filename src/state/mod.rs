//! State module for tracking crawl progress
//!
//! This module provides the state machine the crawl controller moves through.
//!
//! # Components
//!
//! - `CrawlState`: where the controller currently is (enumerating a bucket,
//!   fetching a page, processing an entity, paused, or finished)

mod crawl_state;

// Re-export main types
pub use crawl_state::CrawlState;
