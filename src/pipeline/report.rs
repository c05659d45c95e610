use crate::crawler::CrawlFailure;
use crate::openapi::OperationKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the final document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecSource {
    /// An existing spec found by the probe, returned as served
    Probed,
    /// Built from crawled documentation pages
    Synthesized,
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecSource::Probed => f.write_str("Probed"),
            SpecSource::Synthesized => f.write_str("Synthesized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub path: String,
    /// Upper-case HTTP method
    pub method: String,
}

impl From<&OperationKey> for MergeConflict {
    fn from(key: &OperationKey) -> Self {
        Self {
            path: key.path.clone(),
            method: key.method.to_string(),
        }
    }
}

/// Summary of one pipeline run
///
/// Serialized with camelCase keys; this is the report handed to the provider
/// store and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub root_url: String,
    pub spec_source: SpecSource,
    /// URL of the probed spec, when one was found
    pub probed_from: Option<String>,
    pub pages_visited: usize,
    pub pages_classified_as_api_doc: usize,
    pub extraction_failures: Vec<ExtractionFailure>,
    pub merge_conflicts: Vec<MergeConflict>,
    pub crawl_failures: Vec<CrawlFailure>,
    /// Distinct links seen outside the crawl scope
    pub out_of_scope_links: usize,
    /// Pages skipped for their content type or robots.txt
    pub skipped_pages: usize,
    /// Pages whose extraction was still running when the run was cancelled
    pub abandoned_extractions: Vec<String>,
    pub repairs: Vec<String>,
    /// The run was cut short by cancellation or the overall timeout
    pub partial: bool,
    pub notes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Empty report for a run that starts now
    pub fn new(root_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            root_url: root_url.into(),
            spec_source: SpecSource::Synthesized,
            probed_from: None,
            pages_visited: 0,
            pages_classified_as_api_doc: 0,
            extraction_failures: Vec::new(),
            merge_conflicts: Vec::new(),
            crawl_failures: Vec::new(),
            out_of_scope_links: 0,
            skipped_pages: 0,
            abandoned_extractions: Vec::new(),
            repairs: Vec::new(),
            partial: false,
            notes: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
