//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a run: where
//! the spec came from, crawl and extraction counts, the operations found and
//! everything that needs a second look.

use crate::output::OutputResult;
use crate::pipeline::{PipelineResult, SpecDocument};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Rows shown per URL list before the rest is elided
const LIST_LIMIT: usize = 20;

/// Writes the markdown summary of a run to `output_path`
pub fn generate_markdown_summary(result: &PipelineResult, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(result);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run's report (and the synthesized operations, if any) as markdown
pub fn format_markdown_summary(result: &PipelineResult) -> String {
    let report = &result.report;
    let mut md = String::new();

    md.push_str("# Spec-Weaver Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Root URL**: {}\n", report.root_url));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    let duration = report.duration();
    md.push_str(&format!(
        "- **Duration**: {}.{:03} seconds\n",
        duration.num_seconds(),
        duration.num_milliseconds().rem_euclid(1000)
    ));
    md.push_str(&format!("- **Spec Source**: {}\n", report.spec_source));
    if let Some(probed_from) = &report.probed_from {
        md.push_str(&format!("- **Probed From**: {}\n", probed_from));
    }
    if report.partial {
        md.push_str("- **Partial**: yes\n");
    }
    md.push('\n');

    md.push_str("## Statistics\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Pages Visited | {} |\n", report.pages_visited));
    md.push_str(&format!(
        "| Classified as API Docs | {} |\n",
        report.pages_classified_as_api_doc
    ));
    md.push_str(&format!(
        "| Extraction Failures | {} |\n",
        report.extraction_failures.len()
    ));
    md.push_str(&format!(
        "| Merge Conflicts | {} |\n",
        report.merge_conflicts.len()
    ));
    md.push_str(&format!("| Crawl Failures | {} |\n", report.crawl_failures.len()));
    md.push_str(&format!(
        "| Out-of-Scope Links | {} |\n",
        report.out_of_scope_links
    ));
    md.push_str(&format!("| Skipped Pages | {} |\n\n", report.skipped_pages));

    if let SpecDocument::Synthesized(document) = &result.spec {
        if !document.paths.is_empty() {
            md.push_str("## Operations\n\n");
            md.push_str("| Method | Path | Summary |\n");
            md.push_str("|--------|------|---------|\n");
            for (key, operation) in &document.paths {
                md.push_str(&format!(
                    "| {} | `{}` | {} |\n",
                    key.method,
                    key.path,
                    operation.summary.as_deref().unwrap_or("")
                ));
            }
            md.push('\n');
        }
    }

    if !report.merge_conflicts.is_empty() {
        md.push_str("## Needs Manual Review\n\n");
        for conflict in &report.merge_conflicts {
            md.push_str(&format!("- {} `{}`\n", conflict.method, conflict.path));
        }
        md.push('\n');
    }

    if !report.extraction_failures.is_empty() {
        md.push_str("## Extraction Failures\n\n");
        md.push_str("| URL | Reason |\n");
        md.push_str("|-----|--------|\n");
        for failure in report.extraction_failures.iter().take(LIST_LIMIT) {
            md.push_str(&format!("| {} | {} |\n", failure.url, failure.reason));
        }
        push_elided(&mut md, report.extraction_failures.len());
    }

    if !report.crawl_failures.is_empty() {
        md.push_str("## Crawl Failures\n\n");
        md.push_str("| URL | Reason | Attempts |\n");
        md.push_str("|-----|--------|----------|\n");
        for failure in report.crawl_failures.iter().take(LIST_LIMIT) {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                failure.url, failure.reason, failure.attempts
            ));
        }
        push_elided(&mut md, report.crawl_failures.len());
    }

    if !report.abandoned_extractions.is_empty() {
        md.push_str("## Abandoned Extractions\n\n");
        for url in &report.abandoned_extractions {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    if !report.repairs.is_empty() {
        md.push_str("## Repairs\n\n");
        for repair in &report.repairs {
            md.push_str(&format!("- {}\n", repair));
        }
        md.push('\n');
    }

    if !report.notes.is_empty() {
        md.push_str("## Notes\n\n");
        for note in &report.notes {
            md.push_str(&format!("- {}\n", note));
        }
        md.push('\n');
    }

    md
}

fn push_elided(md: &mut String, total: usize) {
    if total > LIST_LIMIT {
        md.push_str(&format!("\n... and {} more\n\n", total - LIST_LIMIT));
    } else {
        md.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlFailure;
    use crate::openapi::{
        ApiInfo, HttpMethod, OpenApiDocument, OperationKey, OperationSpec,
    };
    use crate::pipeline::{ExtractionFailure, MergeConflict, RunReport, SpecSource};

    fn create_test_result() -> PipelineResult {
        let mut document =
            OpenApiDocument::new(ApiInfo::for_site("https://docs.example.com", None));
        document.paths.insert(
            OperationKey::new("/users", HttpMethod::Get),
            OperationSpec {
                summary: Some("List users".to_string()),
                ..Default::default()
            },
        );

        let mut report = RunReport::new("https://docs.example.com/");
        report.pages_visited = 5;
        report.pages_classified_as_api_doc = 2;
        PipelineResult {
            spec: SpecDocument::Synthesized(document),
            report,
        }
    }

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&create_test_result());

        assert!(markdown.contains("# Spec-Weaver Run Summary"));
        assert!(markdown.contains("- **Root URL**: https://docs.example.com/"));
        assert!(markdown.contains("- **Spec Source**: Synthesized"));
        assert!(markdown.contains("| Pages Visited | 5 |"));
        assert!(markdown.contains("| Classified as API Docs | 2 |"));
        assert!(markdown.contains("| GET | `/users` | List users |"));
        assert!(!markdown.contains("Needs Manual Review"));
    }

    #[test]
    fn test_markdown_lists_problems() {
        let mut result = create_test_result();
        result.report.merge_conflicts.push(MergeConflict {
            path: "/items".to_string(),
            method: "GET".to_string(),
        });
        result.report.extraction_failures.push(ExtractionFailure {
            url: "https://docs.example.com/broken".to_string(),
            reason: "no endpoint signature found".to_string(),
        });
        result.report.crawl_failures.push(CrawlFailure {
            url: "https://docs.example.com/down".to_string(),
            reason: "HTTP 503".to_string(),
            attempts: 3,
        });
        result.report.note("Run was cancelled");

        let markdown = format_markdown_summary(&result);
        assert!(markdown.contains("## Needs Manual Review"));
        assert!(markdown.contains("- GET `/items`"));
        assert!(markdown.contains("| https://docs.example.com/broken | no endpoint signature found |"));
        assert!(markdown.contains("| https://docs.example.com/down | HTTP 503 | 3 |"));
        assert!(markdown.contains("- Run was cancelled"));
    }

    #[test]
    fn test_long_failure_list_elided() {
        let mut result = create_test_result();
        for i in 0..25 {
            result.report.extraction_failures.push(ExtractionFailure {
                url: format!("https://docs.example.com/p{}", i),
                reason: "timeout".to_string(),
            });
        }
        let markdown = format_markdown_summary(&result);
        assert!(markdown.contains("... and 5 more"));
    }

    #[test]
    fn test_probed_summary_has_source_url() {
        let mut result = create_test_result();
        result.report.spec_source = SpecSource::Probed;
        result.report.probed_from = Some("https://docs.example.com/openapi.json".to_string());
        let markdown = format_markdown_summary(&result);
        assert!(markdown.contains("- **Probed From**: https://docs.example.com/openapi.json"));
    }
}
