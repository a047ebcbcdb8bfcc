use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the live registry API
pub const LIVE_BASE_URL: &str = "https://api.company-information.service.gov.uk";

/// Base URL of the sandbox registry API
pub const TEST_BASE_URL: &str = "https://api-sandbox.company-information.service.gov.uk";

/// Name of the checkpoint file inside the data directory
pub const CHECKPOINT_FILE_NAME: &str = "scraping_progress.json";

/// Main configuration structure for Registry-Crawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
}

/// Which registry deployment to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiEnvironment {
    #[default]
    Live,
    Test,
}

impl ApiEnvironment {
    /// Parses the value of `--env` or the environment variable
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live" => Some(Self::Live),
            "test" | "sandbox" => Some(Self::Test),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Live => LIVE_BASE_URL,
            Self::Test => TEST_BASE_URL,
        }
    }
}

/// Registry API access configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApiConfig {
    /// API key sent as the basic-auth user name
    pub api_key: String,

    /// Live or sandbox deployment
    pub environment: ApiEnvironment,

    /// Overrides the environment's base URL (used by tests and proxies)
    pub base_url: Option<String>,

    /// Minimum spacing between consecutive requests (milliseconds)
    pub min_request_interval_ms: u64,

    /// Fixed delay applied after an HTTP 429 before retrying (seconds)
    pub rate_limit_backoff_secs: u64,

    /// Maximum consecutive 429 retries for one request; unbounded when unset
    pub max_rate_limit_retries: Option<u32>,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            environment: ApiEnvironment::Live,
            base_url: None,
            min_request_interval_ms: 100,
            rate_limit_backoff_secs: 60,
            max_rate_limit_retries: None,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// The base URL requests are issued against, without a trailing slash
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    /// The API key with only its first and last five characters visible
    pub fn masked_api_key(&self) -> String {
        mask_secret(self.api_key.trim())
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Number of search results requested per page
    pub page_size: u32,

    /// Write a checkpoint after this many processed entities
    pub save_interval: u64,

    /// Query the resource monitor after this many processed entities
    pub resource_check_interval: u64,

    /// Pause the crawl when free disk drops below this many gigabytes
    pub min_free_disk_gb: f64,

    /// Estimated size of the register, used for progress and ETA
    pub estimated_total: u64,

    /// Ordered prefix tokens used to enumerate the register
    pub buckets: Vec<String>,

    /// Stop after this many processed entities
    pub max_entities: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            save_interval: 1000,
            resource_check_interval: 100,
            min_free_disk_gb: 5.0,
            estimated_total: 4_800_000,
            buckets: default_buckets(),
            max_entities: None,
        }
    }
}

/// The enumeration order of the full register: A-Z then 0-9
pub fn default_buckets() -> Vec<String> {
    ('A'..='Z')
        .chain('0'..='9')
        .map(|c| c.to_string())
        .collect()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory for entity documents
    pub data_dir: PathBuf,

    /// Checkpoint file; defaults to `scraping_progress.json` in the data directory
    pub checkpoint_path: Option<PathBuf>,

    /// Directory for CSV exports; defaults to the data directory
    pub export_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            checkpoint_path: None,
            export_dir: None,
        }
    }
}

impl OutputConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(CHECKPOINT_FILE_NAME))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.clone())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 10 {
        let head: String = chars.iter().take(5).collect();
        return format!("{}...", head);
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{}...{}", head, tail)
}
