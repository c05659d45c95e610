//! Output module for writing specs and run summaries
//!
//! This module handles:
//! - Writing the final spec as JSON or YAML
//! - Generating a markdown summary of a run
//! - Printing run statistics to the console

mod markdown;
mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::print_run_statistics;

use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Unsupported spec file extension for {0}; use .json, .yaml or .yml")]
    UnsupportedFormat(String),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Serialization format of a written spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    /// Picks the format from the file extension
    pub fn from_path(path: &Path) -> OutputResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(SpecFormat::Json),
            Some("yaml") | Some("yml") => Ok(SpecFormat::Yaml),
            _ => Err(OutputError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Renders a spec in the given format
pub fn render_spec(spec: &Value, format: SpecFormat) -> OutputResult<String> {
    match format {
        SpecFormat::Json => {
            let mut out = serde_json::to_string_pretty(spec)?;
            out.push('\n');
            Ok(out)
        }
        SpecFormat::Yaml => Ok(serde_yaml::to_string(spec)?),
    }
}

/// Writes a spec to `path`, as YAML for `.yaml`/`.yml` and JSON for `.json`
pub fn write_spec(spec: &Value, path: &Path) -> OutputResult<()> {
    let rendered = render_spec(spec, SpecFormat::from_path(path)?)?;
    fs::write(path, rendered)?;
    Ok(())
}
