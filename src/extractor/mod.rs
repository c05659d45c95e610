//! Endpoint extraction
//!
//! Turns a classified documentation page into an [`ApiFragment`]. Strategies
//! implement [`PageExtractor`]; [`HeuristicExtractor`] is the default.

mod heuristic;
mod signature;
mod tables;

pub use heuristic::HeuristicExtractor;
pub use signature::{
    find_signature, parse_curl, path_template, resource_name, template_params, CurlCommand,
    Signature,
};
pub use tables::{parse_requirement, table_fields, ParsedTable, TableField};

use crate::classifier::ClassifiedPage;
use crate::openapi::ApiFragment;
use thiserror::Error;

/// Soft, per-page extraction failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no endpoint could be parsed from {url}")]
    NoEndpoints { url: String },

    #[error("extraction of {url} timed out")]
    Timeout { url: String },

    #[error("extraction of {url} aborted: {message}")]
    Aborted { url: String, message: String },
}

impl ExtractionError {
    /// Source page the failure belongs to
    pub fn url(&self) -> &str {
        match self {
            ExtractionError::NoEndpoints { url }
            | ExtractionError::Timeout { url }
            | ExtractionError::Aborted { url, .. } => url,
        }
    }
}

/// Strategy parsing a page into endpoint descriptions
///
/// Implementations run on blocking threads and must not touch shared state.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, page: &ClassifiedPage) -> Result<ApiFragment, ExtractionError>;
}
