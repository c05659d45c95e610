//! Spec-Weaver main entry point
//!
//! This is the command-line interface for turning an API documentation site
//! into an OpenAPI document.

use clap::{Parser, ValueEnum};
use spec_weaver::config::{load_config_with_hash, validate, Config};
use spec_weaver::output::{generate_markdown_summary, print_run_statistics, write_spec};
use spec_weaver::store::SqliteProviderStore;
use spec_weaver::url::ScopeMode;
use spec_weaver::{normalize_url, CrawlScope, JobManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Spec-Weaver: OpenAPI documents from API documentation websites
///
/// Spec-Weaver first looks for a published spec at well-known locations. If
/// none is found it crawls the documentation site, picks out the pages that
/// document endpoints and synthesizes a spec from them.
#[derive(Parser, Debug)]
#[command(name = "spec-weaver")]
#[command(version)]
#[command(about = "Build an OpenAPI document from an API documentation site", long_about = None)]
struct Cli {
    /// Root URL of the documentation site
    #[arg(value_name = "ROOT_URL")]
    root_url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Which links the crawler follows
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,

    /// Path prefix for prefix scope (defaults to the root URL's directory)
    #[arg(long, value_name = "PATH")]
    path_prefix: Option<String>,

    /// Maximum link depth from the root URL
    #[arg(long)]
    max_depth: Option<u32>,

    /// Maximum number of pages fetched
    #[arg(long)]
    max_pages: Option<u32>,

    /// Number of concurrent fetch workers
    #[arg(long)]
    crawl_concurrency: Option<u32>,

    /// Skip the well-known spec locations and always crawl
    #[arg(long)]
    no_probe: bool,

    /// Write the spec here (.json, .yaml or .yml)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write a markdown run summary here
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// SQLite provider library to save the result into
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ScopeArg {
    Origin,
    Prefix,
}

impl From<ScopeArg> for ScopeMode {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Origin => ScopeMode::Origin,
            ScopeArg::Prefix => ScopeMode::Prefix,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli);
    validate(&config)?;

    if cli.dry_run {
        handle_dry_run(&config, &cli.root_url)?;
    } else {
        handle_run(config, &cli.root_url).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spec_weaver=info,warn"),
            1 => EnvFilter::new("spec_weaver=debug,info"),
            2 => EnvFilter::new("spec_weaver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Command-line flags win over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(scope) = cli.scope {
        config.crawler.scope = scope.into();
    }
    if let Some(prefix) = &cli.path_prefix {
        config.crawler.path_prefix = Some(prefix.clone());
    }
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }
    if let Some(pages) = cli.max_pages {
        config.crawler.max_pages = pages;
    }
    if let Some(concurrency) = cli.crawl_concurrency {
        config.crawler.crawl_concurrency = concurrency;
    }
    if cli.no_probe {
        config.pipeline.probe = false;
    }
    if let Some(output) = &cli.output {
        config.output.spec_path = Some(output.display().to_string());
    }
    if let Some(summary) = &cli.summary {
        config.output.summary_path = Some(summary.display().to_string());
    }
    if let Some(store) = &cli.store {
        config.output.store_path = Some(store.display().to_string());
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, root_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let root = normalize_url(root_url)?;
    let scope = CrawlScope::from_mode(
        &root,
        config.crawler.scope,
        config.crawler.path_prefix.as_deref(),
    );

    println!("=== Spec-Weaver Dry Run ===\n");

    println!("Root URL: {}", root);
    println!(
        "  Scope: {:?}{}",
        config.crawler.scope,
        scope
            .prefix()
            .map(|p| format!(" under {}", p))
            .unwrap_or_default()
    );
    println!("  Probe well-known locations: {}", config.pipeline.probe);

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Crawl concurrency: {}", config.crawler.crawl_concurrency);
    println!("  Per-page timeout: {}ms", config.crawler.per_page_timeout_ms);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);

    println!("\nExtractor Configuration:");
    println!(
        "  Extract concurrency: {}",
        config.extractor.extract_concurrency
    );
    println!(
        "  Per-page timeout: {}ms",
        config.extractor.per_page_timeout_ms
    );
    println!(
        "  Confidence floor: {}",
        config.extractor.classifier_confidence_floor
    );
    println!(
        "  Overall timeout: {}ms",
        config.pipeline.overall_timeout_ms
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);

    println!("\nOutput:");
    println!(
        "  Spec: {}",
        config.output.spec_path.as_deref().unwrap_or("stdout")
    );
    println!(
        "  Summary: {}",
        config.output.summary_path.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Store: {}",
        config.output.store_path.as_deref().unwrap_or("(none)")
    );

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main run: submits one job and writes its outputs
async fn handle_run(config: Config, root_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = JobManager::new();
    if let Some(store_path) = &config.output.store_path {
        tracing::info!("Provider store: {}", store_path);
        manager = manager.with_store(Arc::new(SqliteProviderStore::new(Path::new(store_path))?));
    }

    let spec_path = config.output.spec_path.clone();
    let summary_path = config.output.summary_path.clone();

    let id = manager.submit(root_url, config)?;
    tracing::info!("Submitted job {}", id);

    let result = tokio::select! {
        result = manager.result(id) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, finishing with a partial result");
            manager.cancel(id)?;
            manager.result(id).await?
        }
    };

    let spec = result.spec.to_json();
    match &spec_path {
        Some(path) => {
            write_spec(&spec, Path::new(path))?;
            tracing::info!("Spec written to: {}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(&spec)?),
    }

    if let Some(path) = &summary_path {
        generate_markdown_summary(&result, Path::new(path))?;
        tracing::info!("Summary written to: {}", path);
    }

    if spec_path.is_some() {
        print_run_statistics(&result);
    }

    Ok(())
}
