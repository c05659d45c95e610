use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A successfully fetched page
///
/// Immutable once created; the classifier and extractor share it behind an
/// `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Final URL of the page, normalized
    pub url: String,
    pub raw_content: String,
    /// Hex SHA-256 of `raw_content`
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub depth: u32,
    pub title: Option<String>,
    pub content_type: String,
}

impl PageRecord {
    pub fn new(
        url: impl Into<String>,
        raw_content: impl Into<String>,
        content_type: impl Into<String>,
        depth: u32,
        title: Option<String>,
    ) -> Self {
        let raw_content = raw_content.into();
        Self {
            url: url.into(),
            content_hash: content_hash(&raw_content),
            raw_content,
            fetched_at: Utc::now(),
            depth,
            title,
            content_type: content_type.into(),
        }
    }
}

/// Hex-encoded SHA-256 of a page body
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// A page that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlFailure {
    pub url: String,
    pub reason: String,
    pub attempts: u32,
}
