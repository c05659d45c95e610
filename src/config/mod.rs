//! Configuration module for Spec-Weaver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so a run needs no file at all; command-line flags
//! are applied on top of whatever was loaded.
//!
//! # Example
//!
//! ```no_run
//! use spec_weaver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("spec-weaver.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, ExtractorConfig, OutputConfig, PipelineConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
