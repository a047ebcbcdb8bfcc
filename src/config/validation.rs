use crate::config::types::{ApiConfig, Config, CrawlConfig, OutputConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Largest page size the registry's search endpoints accept
const MAX_PAGE_SIZE: u32 = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawl_config(&config.crawl)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates API access configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &config.base_url {
        let url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "base_url '{}' must use http or https",
                base_url
            )));
        }
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_rate_limit_retries == Some(0) {
        return Err(ConfigError::Validation(
            "max_rate_limit_retries must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    if config.save_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "save_interval must be >= 1, got {}",
            config.save_interval
        )));
    }

    if config.resource_check_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "resource_check_interval must be >= 1, got {}",
            config.resource_check_interval
        )));
    }

    if !config.min_free_disk_gb.is_finite() || config.min_free_disk_gb < 0.0 {
        return Err(ConfigError::Validation(format!(
            "min_free_disk_gb must be a non-negative number, got {}",
            config.min_free_disk_gb
        )));
    }

    if config.max_entities == Some(0) {
        return Err(ConfigError::Validation(
            "max_entities must be >= 1 when set".to_string(),
        ));
    }

    validate_buckets(&config.buckets)
}

/// Validates the enumeration bucket list
fn validate_buckets(buckets: &[String]) -> Result<(), ConfigError> {
    if buckets.is_empty() {
        return Err(ConfigError::Validation(
            "buckets cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for bucket in buckets {
        if bucket.trim().is_empty() {
            return Err(ConfigError::Validation(
                "bucket tokens cannot be empty".to_string(),
            ));
        }

        if !seen.insert(bucket.to_uppercase()) {
            return Err(ConfigError::Validation(format!(
                "bucket '{}' appears more than once",
                bucket
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}
