//! URL handling module for Spec-Weaver
//!
//! This module provides URL normalization (the canonical identity used by the
//! crawl frontier) and crawl scope containment.

mod normalize;
mod scope;

pub use normalize::normalize_url;
pub use scope::{CrawlScope, ScopeMode};
