//! Endpoint signature parsing
//!
//! Recognizes `METHOD /path` tokens and cURL commands, and turns the path
//! into an OpenAPI template.

use crate::openapi::{HttpMethod, OperationKey};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// A method and path found in documentation text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub method: HttpMethod,
    /// Path template with `{param}` placeholders
    pub path: String,
    /// Names of query parameters written into the signature
    pub query_params: Vec<String>,
    /// Origin of an absolute URL signature
    pub server: Option<String>,
}

impl Signature {
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.path.clone(), self.method)
    }

    /// Names of `{param}` segments, in order
    pub fn path_params(&self) -> Vec<String> {
        template_params(&self.path)
    }
}

/// A cURL command: its signature and any request body it sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurlCommand {
    pub signature: Signature,
    pub body: Option<String>,
}

fn signature_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"\b(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS|TRACE)\s+(https?://[^\s"'<>`]+|/[^\s"'<>`]*)"#,
        )
        .expect("signature pattern is valid")
    })
}

/// Finds the first `METHOD /path` signature in a text
///
/// Methods must be written in upper case, so prose such as "get /users"
/// does not count.
pub fn find_signature(text: &str) -> Option<Signature> {
    signature_regex().captures_iter(text).find_map(|caps| {
        let method = HttpMethod::parse(caps.get(1)?.as_str())?;
        build_signature(method, caps.get(2)?.as_str())
    })
}

/// Byte range of the first signature, for splitting it off surrounding text
pub fn signature_span(text: &str) -> Option<(usize, usize)> {
    signature_regex().find(text).map(|m| (m.start(), m.end()))
}

/// Parses a cURL command
///
/// Line continuations are joined. The method comes from `-X`/`--request`,
/// otherwise POST when a data flag is present and GET when not.
pub fn parse_curl(text: &str) -> Option<CurlCommand> {
    let joined = text.replace("\\\r\n", " ").replace("\\\n", " ");
    let start = joined.find("curl ")?;
    let tokens = shell_words(&joined[start..]);

    let mut method = None;
    let mut body = None;
    let mut target = None;
    let mut iter = tokens.iter().skip(1).peekable();

    while let Some(token) = iter.next() {
        match token.as_str() {
            "-X" | "--request" => method = iter.next().and_then(|m| HttpMethod::parse(m)),
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-urlencode" | "--json" => {
                body = iter.next().cloned();
            }
            "-H" | "--header" | "-u" | "--user" | "-o" | "--output" | "-A" | "--user-agent" => {
                iter.next();
            }
            t if t.starts_with("-X") && t.len() > 2 => method = HttpMethod::parse(&t[2..]),
            t if target.is_none() && (t.starts_with("http://") || t.starts_with("https://")) => {
                target = Some(t.to_string());
            }
            _ => {}
        }
    }

    let method = method.unwrap_or(if body.is_some() {
        HttpMethod::Post
    } else {
        HttpMethod::Get
    });

    Some(CurlCommand {
        signature: build_signature(method, &target?)?,
        body,
    })
}

fn build_signature(method: HttpMethod, raw_target: &str) -> Option<Signature> {
    let target = raw_target.trim_end_matches(['.', ',', ';', ')', ']', '"', '\'']);

    let (server, raw_path, query) = if target.starts_with("http://") || target.starts_with("https://")
    {
        let url = Url::parse(target).ok()?;
        (
            Some(url.origin().ascii_serialization()),
            url.path().to_string(),
            url.query().map(str::to_string),
        )
    } else {
        let without_fragment = target.split('#').next().unwrap_or("");
        match without_fragment.split_once('?') {
            Some((path, query)) => (None, path.to_string(), Some(query.to_string())),
            None => (None, without_fragment.to_string(), None),
        }
    };

    let query_params = query
        .map(|q| {
            q.split('&')
                .filter_map(|pair| pair.split('=').next())
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Signature {
        method,
        path: path_template(&raw_path),
        query_params,
        server,
    })
}

/// Rewrites a documented path into an OpenAPI path template
///
/// `:id`, `<id>`, `<int:id>` and `{{id}}` segments become `{id}`; repeated
/// and trailing slashes are dropped.
///
/// # Examples
///
/// ```
/// use spec_weaver::extractor::path_template;
///
/// assert_eq!(path_template("/users/:id/posts/"), "/users/{id}/posts");
/// assert_eq!(path_template("/files/<int:file_id>"), "/files/{file_id}");
/// ```
pub fn path_template(raw: &str) -> String {
    let decoded = raw
        .replace("%7B", "{")
        .replace("%7b", "{")
        .replace("%7D", "}")
        .replace("%7d", "}")
        .replace("%3C", "<")
        .replace("%3c", "<")
        .replace("%3E", ">")
        .replace("%3e", ">");

    let segments: Vec<String> = decoded
        .split('/')
        .filter(|s| !s.is_empty())
        .map(template_segment)
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn template_segment(segment: &str) -> String {
    if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
        return format!("{{{}}}", name);
    }
    if let Some(inner) = segment.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")) {
        return format!("{{{}}}", inner.trim());
    }
    if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        let name = inner.rsplit(':').next().unwrap_or(inner);
        return format!("{{{}}}", name.trim());
    }
    segment.to_string()
}

/// Names of `{param}` segments in a path template
pub fn template_params(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|s| s.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Derives a component name from a path's last literal segment
///
/// Version segments and `api` are skipped; the name is singularized and
/// written in PascalCase. `/v1/user-accounts/{id}` gives `UserAccount`.
pub fn resource_name(path: &str) -> String {
    let segment = path
        .split('/')
        .rev()
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .find(|s| !is_version_segment(s) && !s.eq_ignore_ascii_case("api"));

    let Some(segment) = segment else {
        return "Resource".to_string();
    };

    let words: Vec<&str> = segment
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let Some((last, rest)) = words.split_last() else {
        return "Resource".to_string();
    };

    let mut name: String = rest.iter().map(|w| capitalize(w)).collect();
    name.push_str(&capitalize(&singularize(last)));
    name
}

fn is_version_segment(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    lower
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.'))
}

fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.len() > 3 && lower.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if lower.ends_with("sses") || lower.ends_with("xes") || lower.ends_with("ches") {
        word[..word.len() - 2].to_string()
    } else if lower.len() > 1
        && lower.ends_with('s')
        && !(lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is"))
    {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Splits a command line into words, honoring single and double quotes
fn shell_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_signature() {
        let sig = find_signature("Call GET /users/:id to fetch one user.").unwrap();
        assert_eq!(sig.method, HttpMethod::Get);
        assert_eq!(sig.path, "/users/{id}");
        assert_eq!(sig.path_params(), vec!["id".to_string()]);
        assert!(sig.server.is_none());
    }

    #[test]
    fn test_lowercase_method_ignored() {
        assert!(find_signature("you can get /users here").is_none());
    }

    #[test]
    fn test_signature_with_query_and_server() {
        let sig = find_signature("GET https://api.example.com/v1/items?limit=10&offset=0").unwrap();
        assert_eq!(sig.path, "/v1/items");
        assert_eq!(sig.query_params, vec!["limit".to_string(), "offset".to_string()]);
        assert_eq!(sig.server.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn test_absolute_signature_keeps_braces() {
        let sig = find_signature("DELETE https://api.example.com/users/{id}").unwrap();
        assert_eq!(sig.path, "/users/{id}");
    }

    #[test]
    fn test_trailing_punctuation_trimmed() {
        let sig = find_signature("(see POST /orders).").unwrap();
        assert_eq!(sig.path, "/orders");
    }

    #[test]
    fn test_parse_curl() {
        let cmd = parse_curl(
            "curl -X PUT https://api.example.com/users/42 \\\n  -H 'Content-Type: application/json' \\\n  -d '{\"name\": \"Ada\"}'",
        )
        .unwrap();
        assert_eq!(cmd.signature.method, HttpMethod::Put);
        assert_eq!(cmd.signature.path, "/users/42");
        assert_eq!(cmd.body.as_deref(), Some("{\"name\": \"Ada\"}"));
    }

    #[test]
    fn test_curl_method_defaults() {
        let get = parse_curl("curl https://api.example.com/items").unwrap();
        assert_eq!(get.signature.method, HttpMethod::Get);

        let post = parse_curl("curl https://api.example.com/items --data 'a=1'").unwrap();
        assert_eq!(post.signature.method, HttpMethod::Post);
    }

    #[test]
    fn test_curl_without_url() {
        assert!(parse_curl("curl --help").is_none());
    }

    #[test]
    fn test_path_template_styles() {
        assert_eq!(path_template("/a/{{id}}/b/"), "/a/{id}/b");
        assert_eq!(path_template("//a//<name>"), "/a/{name}");
        assert_eq!(path_template(""), "/");
        assert_eq!(path_template("/users/%7Bid%7D"), "/users/{id}");
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name("/users"), "User");
        assert_eq!(resource_name("/v1/user-accounts/{id}"), "UserAccount");
        assert_eq!(resource_name("/api/v2/categories"), "Category");
        assert_eq!(resource_name("/addresses"), "Address");
        assert_eq!(resource_name("/status"), "Status");
        assert_eq!(resource_name("/{id}"), "Resource");
    }
}
