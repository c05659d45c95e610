use crate::url::ScopeMode;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Spec-Weaver
///
/// Every section and key is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub extractor: ExtractorConfig,
    pub pipeline: PipelineConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Which links are followed: same origin, or same origin under a path prefix
    pub scope: ScopeMode,

    /// Explicit path prefix for `prefix` scope; derived from the root URL when absent
    #[serde(rename = "path-prefix")]
    pub path_prefix: Option<String>,

    /// Maximum link depth from the root URL (root is depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages fetched during one crawl
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Number of concurrent fetch workers
    #[serde(rename = "crawl-concurrency")]
    pub crawl_concurrency: u32,

    /// Timeout for a single page fetch (milliseconds)
    #[serde(rename = "per-page-timeout-ms")]
    pub per_page_timeout_ms: u64,

    /// Retries after the first failed attempt of a retryable fetch
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound on a single backoff delay (milliseconds)
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Whether robots.txt rules are honored
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            scope: ScopeMode::Origin,
            path_prefix: None,
            max_depth: 3,
            max_pages: 200,
            crawl_concurrency: 8,
            per_page_timeout_ms: 15_000,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_backoff_ms: 5_000,
            respect_robots: true,
        }
    }
}

impl CrawlerConfig {
    pub fn per_page_timeout(&self) -> Duration {
        Duration::from_millis(self.per_page_timeout_ms)
    }
}

/// Classification and extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Number of extraction jobs running at once
    #[serde(rename = "extract-concurrency")]
    pub extract_concurrency: u32,

    /// Timeout for extracting a single page (milliseconds)
    #[serde(rename = "per-page-timeout-ms")]
    pub per_page_timeout_ms: u64,

    /// Pages scoring below this confidence are not treated as API docs
    #[serde(rename = "classifier-confidence-floor")]
    pub classifier_confidence_floor: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            extract_concurrency: 4,
            per_page_timeout_ms: 5_000,
            classifier_confidence_floor: 0.4,
        }
    }
}

impl ExtractorConfig {
    pub fn per_page_timeout(&self) -> Duration {
        Duration::from_millis(self.per_page_timeout_ms)
    }
}

/// Whole-run configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Deadline for the whole job (milliseconds); the run is cancelled when it passes
    #[serde(rename = "overall-timeout-ms")]
    pub overall_timeout_ms: u64,

    /// Whether well-known spec locations are probed before crawling
    pub probe: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overall_timeout_ms: 300_000,
            probe: true,
        }
    }
}

impl PipelineConfig {
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "spec-weaver".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// SQLite provider library; the run is not persisted when absent
    #[serde(rename = "store-path")]
    pub store_path: Option<String>,

    /// Path to the markdown run summary
    #[serde(rename = "summary-path")]
    pub summary_path: Option<String>,

    /// Path of the written spec (`.json`, `.yaml` or `.yml`)
    #[serde(rename = "spec-path")]
    pub spec_path: Option<String>,
}
