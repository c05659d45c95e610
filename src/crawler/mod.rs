//! Crawler module for documentation site traversal
//!
//! This module contains the crawling logic, including:
//! - HTTP fetching with retry and backoff
//! - HTML parsing and link extraction
//! - The breadth-first frontier
//! - Worker coordination and page streaming

mod coordinator;
mod fetcher;
mod frontier;
mod page;
mod parser;

pub use coordinator::{CrawlHandle, CrawlOptions, CrawlOutcome, CrawlStats, SiteCrawler};
pub use fetcher::{
    build_http_client, fetch_url, fetch_with_retry, is_html_content_type, user_agent_string,
    FetchResult, RetryPolicy,
};
pub use frontier::{CrawlTask, Enqueued, Frontier, NextTask, TaskStatus};
pub use page::{content_hash, CrawlFailure, PageRecord};
pub use parser::{parse_html, ParsedPage};
pub(crate) use parser::resolve_link;
