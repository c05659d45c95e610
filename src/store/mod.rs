//! Provider store
//!
//! The only state that outlives a pipeline run. A run hands its final spec
//! and report to [`ProviderStore::save`]; everything else about the catalog
//! lives outside this crate.

mod memory;
mod schema;
mod sqlite;

pub use memory::InMemoryProviderStore;
pub use sqlite::SqliteProviderStore;

use crate::openapi::HttpMethod;
use crate::pipeline::RunReport;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while saving or reading provider records
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// What a finished run hands to the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRecord {
    /// Host of the documentation root
    pub provider_id: String,
    pub doc_url: String,
    pub spec_json: Value,
    pub report: RunReport,
}

impl ProviderRecord {
    pub fn title(&self) -> Option<&str> {
        self.spec_json.pointer("/info/title").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.spec_json.pointer("/info/version").and_then(Value::as_str)
    }

    /// Number of (path, method) operations in the spec
    pub fn endpoint_count(&self) -> usize {
        self.spec_json
            .get("paths")
            .and_then(Value::as_object)
            .map(|paths| {
                paths
                    .values()
                    .filter_map(Value::as_object)
                    .map(|item| item.keys().filter(|k| HttpMethod::parse(k).is_some()).count())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Repository the pipeline writes its results to
///
/// Implementations must be safe to share between jobs.
pub trait ProviderStore: Send + Sync {
    fn save(&self, record: &ProviderRecord) -> StoreResult<()>;
}
