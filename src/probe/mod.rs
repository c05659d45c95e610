//! Probing for an existing machine-readable spec
//!
//! Before anything is crawled, the root page and a list of well-known
//! locations are checked for an OpenAPI/Swagger document. A hit ends the
//! pipeline early; a miss is the normal path into the crawl.

use crate::crawler::{resolve_link, RetryPolicy};
use crate::url::{normalize_url, CrawlScope};
use crate::WeaverError;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Relative locations where sites commonly publish their spec
pub const WELL_KNOWN_PATHS: &[&str] = &[
    "openapi.json",
    "swagger.json",
    "v2/swagger.json",
    "v3/openapi.json",
    "api/openapi.json",
    "api/swagger.json",
    "docs/openapi.json",
    "docs/swagger.json",
    ".well-known/openapi.json",
    "api-docs/openapi.json",
    "api-docs/swagger.json",
    "swagger/v2/swagger.json",
    "openapi.yaml",
    "swagger.yaml",
    "api-docs",
];

/// A spec document found by the probe
#[derive(Debug, Clone, PartialEq)]
pub struct FoundSpec {
    /// Where the document was served from
    pub url: String,
    /// The body exactly as served
    pub raw: String,
    pub document: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Found(FoundSpec),
    NotFound {
        /// Candidate URLs that were checked, in order
        tried: Vec<String>,
    },
}

/// The root URL's response, when it answered with a success status
#[derive(Debug, Clone)]
pub struct RootPage {
    pub final_url: Url,
    pub content_type: String,
    pub body: String,
}

/// Outcome of a single candidate request
enum Fetched {
    Body { final_url: String, content_type: String, body: String },
    Status(u16),
    Failed { reason: String, connect: bool },
}

/// Checks well-known locations and root-page links for a spec
#[derive(Debug, Clone)]
pub struct SpecProbe {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SpecProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            retry: RetryPolicy::none(),
        }
    }

    /// Retry policy for the root connectivity check
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches the root URL
    ///
    /// A connection-level failure is fatal. Any HTTP answer, even an error
    /// status, proves the site is reachable; `None` is returned when the root
    /// gave no usable body.
    pub async fn check_root(&self, root: &Url) -> Result<Option<RootPage>, WeaverError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.fetch(root.as_str()).await {
                Fetched::Body {
                    final_url,
                    content_type,
                    body,
                } => {
                    let final_url = Url::parse(&final_url).unwrap_or_else(|_| root.clone());
                    return Ok(Some(RootPage {
                        final_url,
                        content_type,
                        body,
                    }));
                }
                Fetched::Status(status) => {
                    debug!("Root {} answered HTTP {}", root, status);
                    return Ok(None);
                }
                Fetched::Failed { reason, connect } => {
                    if attempts > self.retry.max_retries {
                        if connect {
                            return Err(WeaverError::RootUnreachable {
                                url: root.to_string(),
                                reason,
                            });
                        }
                        debug!("Root {} failed: {}", root, reason);
                        return Ok(None);
                    }
                    tokio::time::sleep(self.retry.backoff_for(attempts)).await;
                }
            }
        }
    }

    /// Runs the root check, then tries every candidate location in order
    pub async fn probe(&self, root: &Url) -> Result<ProbeOutcome, WeaverError> {
        let root_page = self.check_root(root).await?;
        Ok(self.probe_candidates(root, root_page.as_ref()).await)
    }

    /// Tries candidate locations given an already fetched root page
    pub async fn probe_candidates(&self, root: &Url, root_page: Option<&RootPage>) -> ProbeOutcome {
        let mut tried = Vec::new();

        if let Some(page) = root_page {
            tried.push(root.to_string());
            if let Some(document) = parse_spec_document(&page.body).filter(is_openapi_document) {
                info!("Root URL {} is itself a spec document", root);
                return ProbeOutcome::Found(FoundSpec {
                    url: page.final_url.to_string(),
                    raw: page.body.clone(),
                    document,
                });
            }
        }

        for candidate in candidate_urls(root, root_page) {
            tried.push(candidate.to_string());
            let Fetched::Body {
                final_url, body, ..
            } = self.fetch(candidate.as_str()).await
            else {
                continue;
            };

            match parse_spec_document(&body) {
                Some(document) if is_openapi_document(&document) => {
                    info!("Found existing spec at {}", final_url);
                    return ProbeOutcome::Found(FoundSpec {
                        url: final_url,
                        raw: body,
                        document,
                    });
                }
                _ => debug!("Candidate {} is not a spec document", candidate),
            }
        }

        info!("No existing spec found after {} candidate(s)", tried.len());
        ProbeOutcome::NotFound { tried }
    }

    async fn fetch(&self, url: &str) -> Fetched {
        let response = match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                return Fetched::Failed {
                    reason: e.to_string(),
                    connect: e.is_connect(),
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Fetched::Status(status.as_u16());
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        match response.text().await {
            Ok(body) => Fetched::Body {
                final_url,
                content_type,
                body,
            },
            Err(e) => Fetched::Failed {
                reason: e.to_string(),
                connect: false,
            },
        }
    }
}

/// Candidate spec URLs after the root itself, deduplicated, in probe order
///
/// Well-known paths against the origin root come first, then the same paths
/// against the root URL's directory, then links found in the root page.
pub fn candidate_urls(root: &Url, root_page: Option<&RootPage>) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut push = |url: Url| {
        let key = normalize_url(url.as_str())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        if seen.insert(key) {
            candidates.push(url);
        }
    };

    push(root.clone());

    let mut bases = Vec::new();
    if let Ok(origin_root) = root.join("/") {
        bases.push(origin_root);
    }
    if let Some(dir) = CrawlScope::with_prefix(root, None).prefix() {
        if let Ok(dir_url) = root.join(&format!("{}/", dir)) {
            bases.push(dir_url);
        }
    }

    for base in &bases {
        for path in WELL_KNOWN_PATHS {
            if let Ok(url) = base.join(path) {
                push(url);
            }
        }
    }

    if let Some(page) = root_page {
        for link in discover_spec_links(&page.body, &page.final_url) {
            push(link);
        }
    }

    candidates.remove(0);
    candidates
}

/// Parses a body as JSON, falling back to YAML
pub fn parse_spec_document(body: &str) -> Option<Value> {
    let trimmed = body.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if trimmed.starts_with('<') {
        return None;
    }
    serde_yaml::from_str::<Value>(trimmed).ok()
}

/// Checks for a version marker and a non-empty `paths` object
pub fn is_openapi_document(document: &Value) -> bool {
    let has_version = ["openapi", "swagger"]
        .iter()
        .any(|key| document.get(key).is_some_and(Value::is_string));
    let has_paths = document
        .get("paths")
        .and_then(Value::as_object)
        .is_some_and(|paths| !paths.is_empty());
    has_version && has_paths
}

fn spec_href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(openapi|swagger|api-docs)[^/]*\.(json|ya?ml)(\?.*)?$")
            .expect("spec href pattern is valid")
    })
}

fn swagger_ui_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\burls?\s*:\s*["']([^"']+)["']"#).expect("swagger-ui url pattern is valid")
    })
}

/// Finds spec links in a page's markup
///
/// Covers `<a>`/`<link>` hrefs naming an openapi/swagger file, Redoc's
/// `spec-url`, `data-spec-url`/`data-url` attributes, and the `url:` option
/// of inline SwaggerUI bootstrap scripts.
pub fn discover_spec_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href], link[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if spec_href_regex().is_match(href.trim()) {
                links.extend(resolve_link(href, base));
            }
        }
    }

    if let Ok(selector) = Selector::parse("[spec-url], [data-spec-url], [data-url]") {
        for element in document.select(&selector) {
            for attr in ["spec-url", "data-spec-url", "data-url"] {
                if let Some(value) = element.value().attr(attr) {
                    links.extend(resolve_link(value, base));
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("script") {
        for script in document.select(&selector) {
            let code = script.text().collect::<String>();
            if !code.contains("SwaggerUI") && !code.contains("Redoc") {
                continue;
            }
            for caps in swagger_ui_url_regex().captures_iter(&code) {
                if let Some(m) = caps.get(1) {
                    links.extend(resolve_link(m.as_str(), base));
                }
            }
        }
    }

    links
}
