//! Spec-Weaver: OpenAPI documents from API documentation websites
//!
//! This crate turns an API documentation site into a machine-readable OpenAPI
//! document. It first probes well-known locations for an existing spec and,
//! on a miss, crawls the site, classifies which pages document endpoints,
//! extracts per-page fragments and merges them into one document.

pub mod classifier;
pub mod config;
pub mod crawler;
pub mod extractor;
mod html;
pub mod merger;
pub mod openapi;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod robots;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for Spec-Weaver operations
///
/// Only conditions that abort a whole job live here. Per-page failures are
/// collected into the run report instead.
#[derive(Debug, Error)]
pub enum WeaverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid root URL '{url}': {reason}")]
    InvalidRootUrl { url: String, reason: String },

    #[error("Root URL {url} is unreachable: {reason}")]
    RootUnreachable { url: String, reason: String },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Provider store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

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

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Spec-Weaver operations
pub type Result<T> = std::result::Result<T, WeaverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use classifier::{ClassifiedPage, HeuristicClassifier, PageClassifier};
pub use config::Config;
pub use crawler::{PageRecord, SiteCrawler};
pub use extractor::{ExtractionError, HeuristicExtractor, PageExtractor};
pub use merger::SpecMerger;
pub use openapi::{ApiFragment, HttpMethod, OpenApiDocument, OperationKey, OperationSpec, Schema};
pub use pipeline::{JobManager, JobStatus, Pipeline, PipelineResult, RunReport, SpecSource};
pub use probe::{ProbeOutcome, SpecProbe};
pub use store::{ProviderStore, SqliteProviderStore};
pub use url::{normalize_url, CrawlScope};
