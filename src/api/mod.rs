//! Registry API module
//!
//! This module contains everything that talks to the registry:
//! - The rate-limited gateway with 429 back-off
//! - Typed search, officer and filing pages
//! - Full entity detail retrieval

mod detail;
mod gateway;
mod throttle;
mod types;

pub use detail::fetch_entity;
pub use gateway::{
    build_http_client, FetchOutcome, Gateway, KEY_CHECK_COMPANY_NUMBER,
    RATE_LIMIT_REMAINING_HEADER,
};
pub use throttle::Throttle;
pub use types::{CompanySummary, EntityRecord, FilingPage, OfficerPage, SearchPage};

use thiserror::Error;

/// Errors surfaced by the gateway
///
/// HTTP 429 never appears here unless a retry cap was configured: the gateway
/// waits it out. Everything else is for the caller to classify.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No API key configured; set COMPANIES_HOUSE_API_KEY or pass --api-key")]
    MissingKey,

    #[error("Authentication failed for {url}; check the API key")]
    Auth { url: String },

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Still rate limited after {attempts} attempts for {url}")]
    RateLimitExhausted { url: String, attempts: u32 },

    #[error("Interrupted while rate limited on {url}")]
    Interrupted { url: String },

    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// True for HTTP 404, which skips a single entity rather than ending a run
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when an interrupt cut a rate-limit back-off short
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// True when the key was rejected
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::MissingKey)
    }

    /// The HTTP status behind this error, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::RateLimitExhausted { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
