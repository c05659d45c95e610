//! HTML parser for link discovery
//!
//! This module handles parsing fetched pages to extract:
//! - Links to follow (from `<a>` tags and canonical links)
//! - Page title

use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from `<title>`, falling back to the first `<h1>`)
    pub title: Option<String>,

    /// All links found on the page, resolved to absolute URLs
    pub links: Vec<Url>,
}

/// Parses HTML content and extracts links and the title
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links (same page anchors)
///
/// Relative links resolve against `<base href>` when the page declares one.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The URL the page was fetched from
///
/// # Example
///
/// ```
/// use spec_weaver::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, page_url);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, &base_url),
    }
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        document
            .select(&selector)
            .next()
            .map(|element| {
                element
                    .text()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.is_empty())
    })
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.push(url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.push(url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub(crate) fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/docs/page").unwrap()
    }

    fn link_strings(parsed: &ParsedPage) -> Vec<&str> {
        parsed.links.iter().map(|u| u.as_str()).collect()
    }

    #[test]
    fn test_extract_title() {
        let html = r#"<html><head><title>  Test Page  </title></head><body></body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(parsed.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let html = r#"<html><body><h1>Users <small>API</small></h1></body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(parsed.title, Some("Users API".to_string()));
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let html = r#"<body>
            <a href="users">Users</a>
            <a href="/items">Items</a>
            <a href="https://other.com/x">Other</a>
        </body>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(
            link_strings(&parsed),
            vec![
                "https://example.com/docs/users",
                "https://example.com/items",
                "https://other.com/x"
            ]
        );
    }

    #[test]
    fn test_skips_special_links() {
        let html = r##"<body>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:a@b.com">mail</a>
            <a href="tel:123">tel</a>
            <a href="#section">anchor</a>
            <a href="/file.zip" download>download</a>
            <a href="">empty</a>
        </body>"##;
        let parsed = parse_html(html, &base_url());
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn test_canonical_link_included() {
        let html = r#"<head><link rel="canonical" href="https://example.com/docs/canonical"></head>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(link_strings(&parsed), vec!["https://example.com/docs/canonical"]);
    }

    #[test]
    fn test_base_href_respected() {
        let html = r#"<head><base href="/reference/"></head><body><a href="users">Users</a></body>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(link_strings(&parsed), vec!["https://example.com/reference/users"]);
    }
}
