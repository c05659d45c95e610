use crate::pipeline::{PipelineResult, SpecDocument};

/// Prints a short run summary to stdout
pub fn print_run_statistics(result: &PipelineResult) {
    let report = &result.report;

    println!("=== Run Statistics ===\n");

    println!("Overview:");
    println!("  Root URL: {}", report.root_url);
    println!("  Spec source: {}", report.spec_source);
    if let Some(probed_from) = &report.probed_from {
        println!("  Probed from: {}", probed_from);
    }
    println!(
        "  Duration: {:.1}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );
    if report.partial {
        println!("  Partial: yes");
    }
    println!();

    println!("Crawl:");
    println!("  Pages visited: {}", report.pages_visited);
    println!(
        "  Classified as API docs: {}",
        report.pages_classified_as_api_doc
    );
    println!("  Crawl failures: {}", report.crawl_failures.len());
    println!("  Out-of-scope links: {}", report.out_of_scope_links);
    println!("  Skipped pages: {}", report.skipped_pages);
    println!();

    if let SpecDocument::Synthesized(document) = &result.spec {
        println!("Spec:");
        println!("  Operations: {}", document.operation_count());
        println!("  Paths: {}", document.path_templates().len());
        println!("  Components: {}", document.components.len());
        println!(
            "  Extraction failures: {}",
            report.extraction_failures.len()
        );
        println!("  Flagged for review: {}", report.merge_conflicts.len());
        println!("  Repairs: {}", report.repairs.len());
        println!();
    }

    for note in &report.notes {
        println!("Note: {}", note);
    }
}
