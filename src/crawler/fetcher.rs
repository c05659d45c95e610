//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler and the probe:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a per-request timeout
//! - Retry with capped exponential backoff for transient failures
//! - Same-origin redirect following
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: String,
        /// Page body content
        body: String,
    },

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// Non-success HTTP status
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Whether another attempt may succeed
        retryable: bool,
    },

    /// Network error (connection refused, timeout, TLS, etc.)
    NetworkError {
        /// Error description
        error: String,
        /// Whether another attempt may succeed
        retryable: bool,
        /// The failure happened while establishing the connection
        connect: bool,
    },
}

impl FetchResult {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchResult::HttpError { retryable, .. } | FetchResult::NetworkError { retryable, .. } => {
                *retryable
            }
            _ => false,
        }
    }

    /// Human-readable reason for a failed fetch, `None` for success or skip
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            FetchResult::HttpError { status_code, .. } => Some(format!("HTTP {}", status_code)),
            FetchResult::NetworkError { error, .. } => Some(error.clone()),
            _ => None,
        }
    }
}

/// Capped exponential backoff between fetch attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Formats the crawler's user agent: `Name/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    let contact: Vec<String> = config
        .contact_url
        .iter()
        .map(|u| format!("+{}", u))
        .chain(config.contact_email.iter().cloned())
        .collect();

    if contact.is_empty() {
        format!("{}/{}", config.crawler_name, config.crawler_version)
    } else {
        format!(
            "{}/{} ({})",
            config.crawler_name,
            config.crawler_version,
            contact.join("; ")
        )
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed only while they stay on the origin of the original
/// request; a cross-origin redirect is returned as-is and surfaces as a
/// non-retryable HTTP error.
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Example
///
/// ```no_run
/// use spec_weaver::config::UserAgentConfig;
/// use spec_weaver::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let redirect_policy = Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if attempt
            .previous()
            .first()
            .is_some_and(|first| first.origin() != attempt.url().origin())
        {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    Client::builder()
        .user_agent(user_agent_string(config))
        .connect_timeout(Duration::from_secs(10))
        .redirect(redirect_policy)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Checks whether a Content-Type header names an HTML document
///
/// A missing header is treated as HTML.
pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.is_empty() || lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

/// Fetches a URL once and classifies the outcome
///
/// # Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx, HTML | Success |
/// | 2xx, other content type | ContentMismatch |
/// | 408, 429, 5xx | HttpError, retryable |
/// | Other non-2xx | HttpError, not retryable |
/// | Timeout / connection failure | NetworkError, retryable |
/// | Body read failure | NetworkError, retryable |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `timeout` - Deadline for the whole request, body included
pub async fn fetch_url(client: &Client, url: &str, timeout: Duration) -> FetchResult {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => return classify_network_error(&e),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            retryable: is_retryable_status(status),
        };
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html_content_type(&content_type) {
        return FetchResult::ContentMismatch { content_type };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
        },
        Err(e) => classify_network_error(&e),
    }
}

/// Fetches a URL, retrying retryable failures with backoff
///
/// Returns the last result and the number of attempts made.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> (FetchResult, u32) {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = fetch_url(client, url, timeout).await;

        if !result.is_retryable() || attempts > policy.max_retries {
            return (result, attempts);
        }

        let delay = policy.backoff_for(attempts);
        debug!(
            "Retrying {} after {:?} (attempt {} failed: {})",
            url,
            delay,
            attempts,
            result.failure_reason().unwrap_or_default()
        );
        tokio::time::sleep(delay).await;
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn classify_network_error(e: &reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        FetchResult::NetworkError {
            error: "Request timeout".to_string(),
            retryable: true,
            connect: false,
        }
    } else if e.is_connect() {
        FetchResult::NetworkError {
            error: format!("Connection failed: {}", e),
            retryable: true,
            connect: true,
        }
    } else if e.is_redirect() {
        FetchResult::NetworkError {
            error: format!("Redirect error: {}", e),
            retryable: false,
            connect: false,
        }
    } else {
        FetchResult::NetworkError {
            error: e.to_string(),
            retryable: true,
            connect: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_string() {
        let mut config = UserAgentConfig {
            crawler_name: "spec-weaver".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: None,
            contact_email: None,
        };
        assert_eq!(user_agent_string(&config), "spec-weaver/1.0");

        config.contact_url = Some("https://example.com/bot".to_string());
        config.contact_email = Some("bot@example.com".to_string());
        assert_eq!(
            user_agent_string(&config),
            "spec-weaver/1.0 (+https://example.com/bot; bot@example.com)"
        );
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&UserAgentConfig::default()).is_ok());
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_html_content_types() {
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(is_html_content_type(""));
        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("application/json"));
    }
}
