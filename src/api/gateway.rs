//! Rate-limited registry API gateway
//!
//! This module handles all HTTP requests to the registry, including:
//! - Building the HTTP client with basic authentication
//! - Spacing consecutive requests
//! - Classifying response statuses
//! - Retrying after HTTP 429 with a fixed back-off
//! - Tracking the server-reported remaining quota

use crate::api::throttle::Throttle;
use crate::api::types::{FilingPage, OfficerPage, SearchPage};
use crate::api::ApiError;
use crate::config::ApiConfig;
use crate::crawler::SharedControl;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Header carrying the number of requests left in the current quota window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-Ratelimit-Remain";

/// A well-known company used to check that the API key is accepted
pub const KEY_CHECK_COMPANY_NUMBER: &str = "00000006";

const NO_QUOTA_REPORTED: i64 = -1;

/// Result of a single request, classified by status
#[derive(Debug)]
pub enum FetchOutcome {
    /// HTTP 2xx with a JSON body
    Ok(Value),

    /// HTTP 429
    RateLimited,

    /// HTTP 404
    NotFound,

    /// HTTP 401
    AuthError,

    /// Any other non-success status
    OtherError {
        /// The HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },
}

/// Builds the HTTP client used for every registry request
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Authenticated, throttled access to the registry API
pub struct Gateway {
    client: Client,
    base_url: String,
    api_key: String,
    throttle: Throttle,
    backoff: Duration,
    max_rate_limit_retries: Option<u32>,
    rate_limit_remaining: AtomicI64,
    control: Option<SharedControl>,
}

impl Gateway {
    /// Creates a gateway from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = build_http_client(config).map_err(ApiError::Client)?;

        tracing::debug!(
            "API gateway initialized for {} (key {})",
            config.resolved_base_url(),
            config.masked_api_key()
        );

        Ok(Self {
            client,
            base_url: config.resolved_base_url(),
            api_key: config.api_key.trim().to_string(),
            throttle: Throttle::new(config.min_request_interval()),
            backoff: config.rate_limit_backoff(),
            max_rate_limit_retries: config.max_rate_limit_retries,
            rate_limit_remaining: AtomicI64::new(NO_QUOTA_REPORTED),
            control: None,
        })
    }

    /// Lets an interrupt on `control` cut rate-limit back-offs short
    pub fn with_control(mut self, control: SharedControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Remaining quota as last reported by the server, for diagnostics only
    pub fn rate_limit_remaining(&self) -> Option<u32> {
        let value = self.rate_limit_remaining.load(Ordering::Relaxed);
        u32::try_from(value).ok()
    }

    /// Issues one throttled GET and classifies the response
    ///
    /// Transport failures and undecodable bodies are errors; every HTTP
    /// status is reported through [`FetchOutcome`].
    pub async fn send_once(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<FetchOutcome, ApiError> {
        let url = self.endpoint(path);
        self.throttle.wait().await;

        tracing::debug!("Making request to: {} with params: {:?}", url, params);

        let mut request = self.client.get(&url).basic_auth(&self.api_key, Some(""));
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if let Some(remaining) = response
            .headers()
            .get(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.rate_limit_remaining
                .store(i64::from(remaining), Ordering::Relaxed);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => return Ok(FetchOutcome::RateLimited),
            StatusCode::NOT_FOUND => return Ok(FetchOutcome::NotFound),
            StatusCode::UNAUTHORIZED => return Ok(FetchOutcome::AuthError),
            _ => {}
        }

        let body = response.bytes().await.map_err(|source| ApiError::Http {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            tracing::debug!("Response content: {}", body);
            return Ok(FetchOutcome::OtherError {
                status: status.as_u16(),
                body,
            });
        }

        let document =
            serde_json::from_slice(&body).map_err(|source| ApiError::Decode { url, source })?;
        Ok(FetchOutcome::Ok(document))
    }

    /// Fetches a JSON document, waiting out rate limits
    ///
    /// On HTTP 429 the gateway sleeps for the configured back-off and issues
    /// the identical request again, for as long as the server keeps
    /// answering 429 (or until `max_rate_limit_retries` is exhausted). An
    /// interrupt during the back-off ends it with `ApiError::Interrupted`.
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let mut rate_limited = 0u32;

        loop {
            match self.send_once(path, params).await? {
                FetchOutcome::Ok(document) => return Ok(document),
                FetchOutcome::RateLimited => {
                    rate_limited += 1;
                    if let Some(max) = self.max_rate_limit_retries {
                        if rate_limited > max {
                            return Err(ApiError::RateLimitExhausted {
                                url: self.endpoint(path),
                                attempts: rate_limited,
                            });
                        }
                    }
                    tracing::warn!(
                        "Rate limit exceeded. Sleeping for {} seconds.",
                        self.backoff.as_secs_f64()
                    );
                    self.back_off(path).await?;
                }
                FetchOutcome::NotFound => {
                    return Err(ApiError::NotFound {
                        url: self.endpoint(path),
                    })
                }
                FetchOutcome::AuthError => {
                    tracing::error!("Authentication error. Check your API key.");
                    return Err(ApiError::Auth {
                        url: self.endpoint(path),
                    });
                }
                FetchOutcome::OtherError { status, body } => {
                    tracing::error!("HTTP error {} for {}", status, self.endpoint(path));
                    return Err(ApiError::Status {
                        url: self.endpoint(path),
                        status,
                        body,
                    });
                }
            }
        }
    }

    /// Searches companies by name or number
    pub async fn search_companies(
        &self,
        query: &str,
        items_per_page: u32,
        start_index: u64,
    ) -> Result<SearchPage, ApiError> {
        let params = [
            ("q", query.to_string()),
            ("items_per_page", items_per_page.to_string()),
            ("start_index", start_index.to_string()),
        ];
        self.get_typed("search/companies", &params).await
    }

    /// Fetches a company's profile document
    pub async fn company_profile(&self, company_number: &str) -> Result<Value, ApiError> {
        self.get(&format!("company/{}", company_number), &[]).await
    }

    /// Fetches one page of a company's officers
    pub async fn company_officers(
        &self,
        company_number: &str,
        items_per_page: u32,
        start_index: u64,
    ) -> Result<OfficerPage, ApiError> {
        let params = [
            ("items_per_page", items_per_page.to_string()),
            ("start_index", start_index.to_string()),
        ];
        self.get_typed(&format!("company/{}/officers", company_number), &params)
            .await
    }

    /// Fetches one page of a company's filing history
    pub async fn filing_history(
        &self,
        company_number: &str,
        items_per_page: u32,
        start_index: u64,
    ) -> Result<FilingPage, ApiError> {
        let params = [
            ("items_per_page", items_per_page.to_string()),
            ("start_index", start_index.to_string()),
        ];
        self.get_typed(&format!("company/{}/filing-history", company_number), &params)
            .await
    }

    /// Checks that the configured key is accepted by the registry
    ///
    /// Only an authentication failure or a transport error is fatal; any other
    /// unexpected status is logged and tolerated.
    pub async fn validate_api_key(&self) -> Result<(), ApiError> {
        if self.api_key.is_empty() {
            return Err(ApiError::MissingKey);
        }

        tracing::info!("Validating API key...");
        let path = format!("company/{}", KEY_CHECK_COMPANY_NUMBER);

        match self.send_once(&path, &[]).await? {
            FetchOutcome::Ok(_) => {
                tracing::info!("API key validation successful");
                Ok(())
            }
            FetchOutcome::AuthError => {
                tracing::error!("API key invalid or unauthorized. Please check your API key.");
                tracing::error!(
                    "Make sure the key matches the selected environment (live or test)"
                );
                Err(ApiError::Auth {
                    url: self.endpoint(&path),
                })
            }
            FetchOutcome::RateLimited => {
                tracing::warn!("Rate limited during API key validation; continuing");
                Ok(())
            }
            FetchOutcome::NotFound => {
                tracing::warn!("API returned unexpected status code during validation: 404");
                Ok(())
            }
            FetchOutcome::OtherError { status, body } => {
                tracing::warn!(
                    "API returned unexpected status code during validation: {}",
                    status
                );
                tracing::debug!("Response content: {}", body);
                Ok(())
            }
        }
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let document = self.get(path, params).await?;
        serde_json::from_value(document).map_err(|source| ApiError::Decode {
            url: self.endpoint(path),
            source,
        })
    }

    async fn back_off(&self, path: &str) -> Result<(), ApiError> {
        let Some(control) = &self.control else {
            tokio::time::sleep(self.backoff).await;
            return Ok(());
        };

        tokio::select! {
            _ = tokio::time::sleep(self.backoff) => Ok(()),
            _ = control.wait_for_interrupt() => {
                tracing::warn!("Interrupted during rate-limit back-off");
                Err(ApiError::Interrupted {
                    url: self.endpoint(path),
                })
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
