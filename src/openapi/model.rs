use crate::openapi::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods an operation can be documented under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    /// Lowercase form, as used for OpenAPI path item keys
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }

    /// Case-insensitive parse
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Methods whose parameters travel in the query string by default
    pub fn has_query_parameters(&self) -> bool {
        matches!(
            self,
            HttpMethod::Get | HttpMethod::Delete | HttpMethod::Head | HttpMethod::Options
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Identity of an operation: path template plus method
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationKey {
    pub path: String,
    pub method: HttpMethod,
}

impl OperationKey {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Where a parameter is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    /// Member of the request body; rendered through `requestBody`
    Body,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Body => "body",
        }
    }
}

/// Whether the documentation states a parameter is required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    Required,
    Optional,
    Unknown,
}

impl Requirement {
    pub fn is_known(&self) -> bool {
        !matches!(self, Requirement::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: Requirement,
    pub schema: Schema,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: Requirement::Unknown,
            schema: Schema::Unknown,
            description: None,
        }
    }

    /// Path parameter declared by a `{name}` template segment
    pub fn path(name: impl Into<String>) -> Self {
        Self {
            required: Requirement::Required,
            ..Self::new(name, ParameterLocation::Path)
        }
    }

    pub fn same_slot(&self, other: &Parameter) -> bool {
        self.name == other.name && self.location == other.location
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSpec {
    pub description: Option<String>,
    /// `None` when the documentation shows no body for this status
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleKind {
    Request,
    Response,
}

/// An example payload copied from the documentation
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub kind: ExampleKind,
    /// Status code for response examples
    pub status: Option<String>,
    pub payload: Value,
}

/// Everything known about one operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSpec {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<Schema>,
    pub responses: BTreeMap<String, ResponseSpec>,
    pub examples: Vec<Example>,
}

impl OperationSpec {
    pub fn parameter(&self, name: &str, location: ParameterLocation) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name == name && p.location == location)
    }

    /// Every schema in the operation, for reference rewriting
    pub fn schemas_mut(&mut self) -> impl Iterator<Item = &mut Schema> {
        self.parameters
            .iter_mut()
            .map(|p| &mut p.schema)
            .chain(self.request_body.iter_mut())
            .chain(self.responses.values_mut().filter_map(|r| r.schema.as_mut()))
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.parameters
            .iter()
            .map(|p| &p.schema)
            .chain(self.request_body.iter())
            .chain(self.responses.values().filter_map(|r| r.schema.as_ref()))
    }
}

/// Endpoint descriptions extracted from one page
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFragment {
    pub source_url: String,
    pub paths: BTreeMap<OperationKey, OperationSpec>,
    pub components: BTreeMap<String, Schema>,
    /// Absolute base URLs seen in endpoint signatures
    pub servers: Vec<String>,
    /// Classifier confidence of the source page; only used to break merge ties
    pub confidence: f64,
}

impl ApiFragment {
    pub fn new(source_url: impl Into<String>, confidence: f64) -> Self {
        Self {
            source_url: source_url.into(),
            paths: BTreeMap::new(),
            components: BTreeMap::new(),
            servers: Vec::new(),
            confidence,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

impl ApiInfo {
    /// Info block for a document synthesized from a documentation site
    pub fn for_site(root_url: &str, title: Option<&str>) -> Self {
        Self {
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or("API Documentation")
                .to_string(),
            version: "1.0.0".to_string(),
            description: Some(format!("API documentation crawled from {}", root_url)),
        }
    }
}

/// Where an operation came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    pub sources: Vec<String>,
    pub requires_manual_review: bool,
}

/// The merged document
#[derive(Debug, Clone, PartialEq)]
pub struct OpenApiDocument {
    pub info: ApiInfo,
    pub servers: Vec<String>,
    pub paths: BTreeMap<OperationKey, OperationSpec>,
    pub components: BTreeMap<String, Schema>,
    pub provenance: BTreeMap<OperationKey, ProvenanceRecord>,
}

impl OpenApiDocument {
    pub fn new(info: ApiInfo) -> Self {
        Self {
            info,
            servers: Vec::new(),
            paths: BTreeMap::new(),
            components: BTreeMap::new(),
            provenance: BTreeMap::new(),
        }
    }

    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&OperationSpec> {
        self.paths.get(&OperationKey::new(path, method))
    }

    pub fn operation_count(&self) -> usize {
        self.paths.len()
    }

    /// Distinct path templates, in order
    pub fn path_templates(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.paths.keys().map(|k| k.path.as_str()).collect();
        paths.dedup();
        paths
    }
}
