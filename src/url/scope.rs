use serde::{Deserialize, Serialize};
use url::{Origin, Url};

/// How far the crawler may wander from the root URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeMode {
    /// Same scheme, host and port as the root
    #[default]
    Origin,
    /// Same origin, and the path must sit under a prefix
    Prefix,
}

/// The set of URLs a crawl is allowed to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlScope {
    origin: Origin,
    prefix: Option<String>,
}

impl CrawlScope {
    /// Scope limited to the root URL's origin
    pub fn origin(root: &Url) -> Self {
        Self {
            origin: root.origin(),
            prefix: None,
        }
    }

    /// Scope limited to the root URL's origin and a path prefix
    ///
    /// Without an explicit prefix, the root URL's directory is used: a root of
    /// `/docs/api/` or `/docs/api` scopes to `/docs/api`, a root of
    /// `/docs/index.html` scopes to `/docs`.
    pub fn with_prefix(root: &Url, prefix: Option<&str>) -> Self {
        let prefix = match prefix {
            Some(p) => trim_prefix(p),
            None => derive_prefix(root.path()),
        };

        Self {
            origin: root.origin(),
            prefix: if prefix == "/" { None } else { Some(prefix) },
        }
    }

    /// Builds the scope from a configured mode
    pub fn from_mode(root: &Url, mode: ScopeMode, prefix: Option<&str>) -> Self {
        match mode {
            ScopeMode::Origin => Self::origin(root),
            ScopeMode::Prefix => Self::with_prefix(root, prefix),
        }
    }

    /// Returns the path prefix, if the scope has one
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Checks whether a URL may be fetched under this scope
    ///
    /// Prefix matching is segment-aware: `/docs` contains `/docs` and
    /// `/docs/users` but not `/docsearch`.
    pub fn contains(&self, url: &Url) -> bool {
        if url.origin() != self.origin {
            return false;
        }

        match &self.prefix {
            None => true,
            Some(prefix) => {
                let path = url.path();
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

fn trim_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn derive_prefix(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let last_segment = trimmed.rsplit('/').next().unwrap_or("");

    // A last segment with an extension names a file, scope to its directory
    if last_segment.contains('.') {
        match trimmed.rfind('/') {
            Some(idx) => trim_prefix(&trimmed[..idx]),
            None => "/".to_string(),
        }
    } else {
        trim_prefix(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_origin_scope() {
        let scope = CrawlScope::origin(&url("https://docs.example.com/api"));
        assert!(scope.contains(&url("https://docs.example.com/")));
        assert!(scope.contains(&url("https://docs.example.com/guides/x")));
        assert!(!scope.contains(&url("http://docs.example.com/api")));
        assert!(!scope.contains(&url("https://docs.example.com:8443/api")));
        assert!(!scope.contains(&url("https://blog.example.com/api")));
    }

    #[test]
    fn test_prefix_scope_from_root_directory() {
        let scope = CrawlScope::with_prefix(&url("https://example.com/docs/api/"), None);
        assert_eq!(scope.prefix(), Some("/docs/api"));
        assert!(scope.contains(&url("https://example.com/docs/api")));
        assert!(scope.contains(&url("https://example.com/docs/api/users")));
        assert!(!scope.contains(&url("https://example.com/docs/apis")));
        assert!(!scope.contains(&url("https://example.com/blog")));
    }

    #[test]
    fn test_prefix_scope_from_file_root() {
        let scope = CrawlScope::with_prefix(&url("https://example.com/docs/index.html"), None);
        assert_eq!(scope.prefix(), Some("/docs"));
        assert!(scope.contains(&url("https://example.com/docs/users.html")));
    }

    #[test]
    fn test_explicit_prefix() {
        let scope = CrawlScope::with_prefix(&url("https://example.com/"), Some("/reference/"));
        assert!(scope.contains(&url("https://example.com/reference/items")));
        assert!(!scope.contains(&url("https://example.com/")));
    }

    #[test]
    fn test_root_prefix_is_origin_scope() {
        let scope = CrawlScope::from_mode(&url("https://example.com/"), ScopeMode::Prefix, None);
        assert_eq!(scope, CrawlScope::origin(&url("https://example.com/")));
    }
}
