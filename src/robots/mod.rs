//! Robots.txt handling module
//!
//! One robots.txt is fetched per crawl (the crawl never leaves the root's
//! origin). A missing or unreadable robots.txt allows everything.

mod parser;

pub use parser::ParsedRobots;

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Fetches robots.txt for the origin of `root`
///
/// # Arguments
///
/// * `client` - The HTTP client (already carrying the user agent)
/// * `root` - Any URL on the origin
/// * `timeout` - Request deadline
///
/// # Returns
///
/// The parsed rules, or allow-all when the file is absent (any non-2xx status)
/// or the request fails.
pub async fn fetch_robots(client: &Client, root: &Url, timeout: Duration) -> ParsedRobots {
    let robots_url = match root.join("/robots.txt") {
        Ok(url) => url,
        Err(_) => return ParsedRobots::allow_all(),
    };

    let response = match client.get(robots_url.as_str()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        debug!("No robots.txt at {} ({})", robots_url, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            debug!("Loaded robots.txt from {}", robots_url);
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            warn!("Failed to read {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
