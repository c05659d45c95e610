//! Page classification
//!
//! Decides which crawled pages document API endpoints. Strategies implement
//! [`PageClassifier`]; [`HeuristicClassifier`] is the default.

mod heuristic;

pub use heuristic::{HeuristicClassifier, API_DOC_INDICATORS};

use crate::crawler::PageRecord;
use serde::Serialize;
use std::sync::Arc;

/// Evidence a classifier found on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Signal {
    /// `GET /users`-style method and path token
    MethodPath,
    /// cURL command in a code block
    CurlCommand,
    /// Any `<pre>` or `<code>` block
    CodeBlock,
    /// Table whose header names parameters and their types or requiredness
    ParameterTable,
    /// Request/response example wording
    ExampleWording,
    /// Code block holding a JSON object or array
    JsonExample,
    /// API documentation vocabulary in the title or headings
    ApiVocabulary,
}

/// A page together with the classifier's verdict
#[derive(Debug, Clone)]
pub struct ClassifiedPage {
    pub page: Arc<PageRecord>,
    pub is_api_doc: bool,
    /// In [0, 1]
    pub confidence: f64,
    pub signals: Vec<Signal>,
}

/// Strategy deciding whether a page documents API endpoints
///
/// Implementations must be pure: the same page always yields the same verdict.
pub trait PageClassifier: Send + Sync {
    fn classify(&self, page: &Arc<PageRecord>) -> ClassifiedPage;
}

/// Classifies every page and keeps the ones judged to be API documentation
pub fn select_api_pages(
    classifier: &dyn PageClassifier,
    pages: &[Arc<PageRecord>],
) -> Vec<ClassifiedPage> {
    pages
        .iter()
        .map(|page| classifier.classify(page))
        .filter(|classified| classified.is_api_doc)
        .collect()
}
