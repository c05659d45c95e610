use crate::classifier::ClassifiedPage;
use crate::extractor::signature::{find_signature, parse_curl, resource_name, signature_span, Signature};
use crate::extractor::tables::{parse_location, parse_table, table_fields, ParsedTable, TableField};
use crate::extractor::{ExtractionError, PageExtractor};
use crate::html::{element_text, has_ancestor, raw_text};
use crate::openapi::{
    register_component, ApiFragment, Example, ExampleKind, OperationKey, OperationSpec, Parameter,
    ParameterLocation, Requirement, ResponseSpec, Schema,
};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "pre", "table", "ul", "ol", "li", "dl", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article",
];

const TEXT_CONTAINERS: &[&str] = &["p", "dt", "dd", "h1", "h2", "h3", "h4", "h5", "h6"];

const SKIPPED_REGIONS: &[&str] = &["nav", "footer", "script", "style", "noscript", "template"];

const SECTION_WORDS: &[&str] = &[
    "parameter",
    "request",
    "response",
    "example",
    "header",
    "body",
    "error",
    "return",
    "result",
    "field",
    "参数",
    "示例",
    "返回",
    "响应",
    "请求",
    "错误",
    "字段",
];

/// Walks a page's headings, paragraphs, code blocks and tables in document
/// order and groups them under the endpoint signatures they follow.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PageExtractor for HeuristicExtractor {
    fn extract(&self, page: &ClassifiedPage) -> Result<ApiFragment, ExtractionError> {
        let url = page.page.url.clone();
        let document = Html::parse_document(&page.page.raw_content);
        let blocks = collect_blocks(&document);

        let drafts = Walker::default().walk(blocks);
        if drafts.is_empty() {
            return Err(ExtractionError::NoEndpoints { url });
        }

        let mut fragment = ApiFragment::new(url, page.confidence);
        for draft in drafts {
            if let Some(server) = &draft.signature.server {
                if !fragment.servers.contains(server) {
                    fragment.servers.push(server.clone());
                }
            }
            let key = draft.signature.key();
            let operation = draft.finish(&mut fragment.components);
            match fragment.paths.get_mut(&key) {
                Some(existing) => absorb(existing, operation),
                None => {
                    fragment.paths.insert(key, operation);
                }
            }
        }

        debug!(
            "Extracted {} operation(s) from {}",
            fragment.paths.len(),
            fragment.source_url
        );
        Ok(fragment)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Heading { level: u8, text: String },
    Text(String),
    Code(String),
    Table(ParsedTable),
}

fn collect_blocks(document: &Html) -> Vec<Block> {
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6, p, li, dt, dd, pre, table, div")
    else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|el| !has_ancestor(el, SKIPPED_REGIONS))
        .filter_map(|el| to_block(&el))
        .collect()
}

fn to_block(el: &ElementRef) -> Option<Block> {
    if has_ancestor(el, &["pre", "table"]) {
        return None;
    }

    let name = el.value().name();
    match name {
        "pre" => {
            let code = raw_text(el);
            (!code.trim().is_empty()).then(|| Block::Code(code.trim().to_string()))
        }
        "table" => Some(Block::Table(parse_table(el))),
        _ => {
            if has_ancestor(el, TEXT_CONTAINERS) || contains_block(el) {
                return None;
            }
            let text = element_text(el);
            if text.is_empty() {
                return None;
            }
            match heading_level(name) {
                Some(level) => Some(Block::Heading { level, text }),
                None => Some(Block::Text(text)),
            }
        }
    }
}

fn heading_level(name: &str) -> Option<u8> {
    let digit = name.strip_prefix('h')?;
    match digit.parse::<u8>() {
        Ok(level @ 1..=6) if digit.len() == 1 => Some(level),
        _ => None,
    }
}

/// Whether a list item or div wraps further block content
fn contains_block(el: &ElementRef) -> bool {
    let name = el.value().name();
    if name != "li" && name != "div" {
        return false;
    }
    el.descendants().skip(1).any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| BLOCK_ELEMENTS.contains(&e.name()))
    })
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([1-5]\d\d)\b").expect("status pattern is valid"))
}

/// What the most recent section label says the following content is
#[derive(Debug, Clone, Default, PartialEq)]
struct Context {
    kind: Option<ExampleKind>,
    status: Option<String>,
    location: Option<ParameterLocation>,
}

impl Context {
    fn from_label(text: &str) -> Self {
        let lower = text.to_lowercase();
        let kind = if ["response", "return", "result", "返回", "响应"]
            .iter()
            .any(|w| lower.contains(w))
        {
            Some(ExampleKind::Response)
        } else if ["request", "body", "请求"].iter().any(|w| lower.contains(w)) {
            Some(ExampleKind::Request)
        } else {
            None
        };

        let status = (kind == Some(ExampleKind::Response))
            .then(|| status_regex().captures(text))
            .flatten()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        let location = if kind == Some(ExampleKind::Response) {
            None
        } else {
            parse_location(text)
        };

        Self {
            kind,
            status,
            location,
        }
    }

    fn response_status(&self) -> String {
        self.status.clone().unwrap_or_else(|| "200".to_string())
    }
}

/// Short headings and lines such as "Query parameters" or "返回示例："
fn is_section_label(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() > 48 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    SECTION_WORDS.iter().any(|w| lower.contains(w))
}

fn is_text_label(text: &str) -> bool {
    let trimmed = text.trim();
    is_section_label(trimmed)
        && (trimmed.ends_with(':')
            || trimmed.ends_with('：')
            || trimmed.split_whitespace().count() <= 3)
}

#[derive(Debug)]
struct Draft {
    signature: Signature,
    anchor_level: Option<u8>,
    summary: Option<String>,
    description: Vec<String>,
    parameters: Vec<Parameter>,
    request_example: Option<Value>,
    response_examples: BTreeMap<String, Value>,
    response_fields: BTreeMap<String, Vec<TableField>>,
    examples: Vec<Example>,
}

impl Draft {
    fn new(signature: Signature, anchor_level: Option<u8>, summary: Option<String>) -> Self {
        let mut parameters: Vec<Parameter> = signature
            .path_params()
            .into_iter()
            .map(Parameter::path)
            .collect();
        for name in &signature.query_params {
            let param = Parameter::new(name.clone(), ParameterLocation::Query);
            if !parameters.iter().any(|p| p.same_slot(&param)) {
                parameters.push(param);
            }
        }

        Self {
            signature,
            anchor_level,
            summary,
            description: Vec::new(),
            parameters,
            request_example: None,
            response_examples: BTreeMap::new(),
            response_fields: BTreeMap::new(),
            examples: Vec::new(),
        }
    }

    fn key(&self) -> OperationKey {
        self.signature.key()
    }

    fn add_table(&mut self, fields: Vec<TableField>, context: &Context) {
        if context.kind == Some(ExampleKind::Response) {
            self.response_fields
                .entry(context.response_status())
                .or_default()
                .extend(fields);
            return;
        }

        let template = self.signature.path_params();
        for field in fields {
            let location = field
                .location
                .or(context.location)
                .unwrap_or_else(|| self.default_location(&field.name, &template, context));
            let incoming = Parameter {
                name: field.name,
                location,
                required: field.required,
                schema: field.schema,
                description: field.description,
            };

            match self.parameters.iter_mut().find(|p| p.same_slot(&incoming)) {
                Some(existing) => fill_parameter(existing, incoming),
                None => self.parameters.push(incoming),
            }
        }
    }

    fn default_location(&self, name: &str, template: &[String], context: &Context) -> ParameterLocation {
        if template.iter().any(|t| t == name) {
            ParameterLocation::Path
        } else if context.kind == Some(ExampleKind::Request)
            && !self.signature.method.has_query_parameters()
        {
            ParameterLocation::Body
        } else if self.signature.method.has_query_parameters() {
            ParameterLocation::Query
        } else {
            ParameterLocation::Body
        }
    }

    fn add_example(&mut self, payload: Value, context: &Context) {
        match context.kind {
            Some(ExampleKind::Request) => {
                if self.request_example.is_none() {
                    self.request_example = Some(payload.clone());
                }
                self.examples.push(Example {
                    kind: ExampleKind::Request,
                    status: None,
                    payload,
                });
            }
            _ => {
                let status = context.response_status();
                self.response_examples
                    .entry(status.clone())
                    .or_insert_with(|| payload.clone());
                self.examples.push(Example {
                    kind: ExampleKind::Response,
                    status: Some(status),
                    payload,
                });
            }
        }
    }

    /// Builds the operation, registering response objects as components
    fn finish(self, components: &mut BTreeMap<String, Schema>) -> OperationSpec {
        let resource = resource_name(&self.signature.path);

        let mut statuses: Vec<&String> = self
            .response_examples
            .keys()
            .chain(self.response_fields.keys())
            .collect();
        statuses.sort();
        statuses.dedup();

        let mut responses = BTreeMap::new();
        for status in statuses {
            let from_example = self.response_examples.get(status).map(Schema::infer);
            let from_table = self.response_fields.get(status).map(|f| fields_schema(f));
            let Some(schema) = combine(from_table, from_example) else {
                continue;
            };
            responses.insert(
                status.clone(),
                ResponseSpec {
                    description: None,
                    schema: Some(name_objects(schema, &resource, components)),
                },
            );
        }

        let body_fields: Vec<TableField> = self
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Body)
            .map(|p| TableField {
                name: p.name.clone(),
                schema: p.schema.clone(),
                required: p.required,
                location: Some(ParameterLocation::Body),
                description: p.description.clone(),
            })
            .collect();
        let request_body = combine(
            (!body_fields.is_empty()).then(|| fields_schema(&body_fields)),
            self.request_example.as_ref().map(Schema::infer),
        );

        let description = if self.description.is_empty() {
            None
        } else {
            Some(self.description.join("\n\n"))
        };

        OperationSpec {
            summary: self.summary,
            description,
            parameters: self.parameters,
            request_body,
            responses,
            examples: self.examples,
        }
    }
}

/// Fills what an earlier declaration of the same parameter left open
fn fill_parameter(existing: &mut Parameter, incoming: Parameter) {
    if existing.location != ParameterLocation::Path && !existing.required.is_known() {
        existing.required = incoming.required;
    }
    if let Ok(schema) = existing.schema.reconcile(&incoming.schema) {
        existing.schema = schema;
    }
    if existing.description.is_none() {
        existing.description = incoming.description;
    }
}

fn fields_schema(fields: &[TableField]) -> Schema {
    let mut properties = BTreeMap::new();
    let mut required = Vec::new();
    for field in fields {
        properties
            .entry(field.name.clone())
            .or_insert_with(|| field.schema.clone());
        if field.required == Requirement::Required && !required.contains(&field.name) {
            required.push(field.name.clone());
        }
    }
    required.sort();
    Schema::Object {
        properties,
        required,
    }
}

/// Combines a field-table sketch with an example-inferred one
///
/// Table types win; the example fills unknown types and contributes
/// properties the table left out.
fn combine(table: Option<Schema>, example: Option<Schema>) -> Option<Schema> {
    match (table, example) {
        (
            Some(Schema::Object {
                mut properties,
                required,
            }),
            Some(Schema::Object {
                properties: inferred,
                ..
            }),
        ) => {
            for (name, schema) in inferred {
                match properties.get_mut(&name) {
                    Some(existing) => {
                        if let Ok(merged) = existing.reconcile(&schema) {
                            *existing = merged;
                        }
                    }
                    None => {
                        properties.insert(name, schema);
                    }
                }
            }
            Some(Schema::Object {
                properties,
                required,
            })
        }
        (Some(Schema::Object { properties, required }), Some(Schema::Array(items)))
            if matches!(*items, Schema::Object { .. } | Schema::Unknown) =>
        {
            let item = combine(
                Some(Schema::Object {
                    properties,
                    required,
                }),
                Some(*items),
            );
            item.map(|i| Schema::Array(Box::new(i)))
        }
        (Some(table), _) => Some(table),
        (None, example) => example,
    }
}

/// Moves non-empty response objects into named components
fn name_objects(
    schema: Schema,
    resource: &str,
    components: &mut BTreeMap<String, Schema>,
) -> Schema {
    match schema {
        Schema::Object { ref properties, .. } if !properties.is_empty() => {
            Schema::Ref(register_component(components, resource, schema))
        }
        Schema::Array(items) => Schema::Array(Box::new(name_objects(*items, resource, components))),
        other => other,
    }
}

/// Merges a second description of the same operation on one page
fn absorb(existing: &mut OperationSpec, later: OperationSpec) {
    if existing.summary.is_none() {
        existing.summary = later.summary;
    }
    if let Some(b) = later.description {
        match &mut existing.description {
            Some(a) => {
                if !a.contains(&b) {
                    a.push_str("\n\n");
                    a.push_str(&b);
                }
            }
            slot @ None => *slot = Some(b),
        }
    }
    for param in later.parameters {
        match existing.parameters.iter_mut().find(|p| p.same_slot(&param)) {
            Some(current) => fill_parameter(current, param),
            None => existing.parameters.push(param),
        }
    }
    if existing.request_body.is_none() {
        existing.request_body = later.request_body;
    }
    for (status, response) in later.responses {
        existing.responses.entry(status).or_insert(response);
    }
    existing.examples.extend(later.examples);
}

/// Block-walk state
#[derive(Debug, Default)]
struct Walker {
    drafts: Vec<Draft>,
    current: Option<Draft>,
    /// Last topic heading not yet claimed by a draft
    title: Option<(u8, String)>,
    pending_description: Vec<String>,
    pending_tables: Vec<(Vec<TableField>, Context)>,
    context: Context,
}

impl Walker {
    fn walk(mut self, blocks: Vec<Block>) -> Vec<Draft> {
        for block in blocks {
            match block {
                Block::Heading { level, text } => self.heading(level, text),
                Block::Text(text) => self.text(text),
                Block::Code(code) => self.code(code),
                Block::Table(table) => self.table(table),
            }
        }
        self.close();
        self.drafts
    }

    fn heading(&mut self, level: u8, text: String) {
        if let Some(signature) = find_signature(&text) {
            let summary = strip_signature(&text);
            self.start(signature, Some(level), summary);
            return;
        }

        if is_section_label(&text) {
            self.context = Context::from_label(&text);
            return;
        }

        let closes = match &self.current {
            Some(draft) => draft.anchor_level.map_or(true, |anchor| level <= anchor),
            None => false,
        };
        if closes {
            self.close();
        }
        if self.current.is_none() {
            self.pending_description.clear();
            self.pending_tables.clear();
        }
        self.title = Some((level, text));
        self.context = Context::default();
    }

    fn text(&mut self, text: String) {
        if let Some(signature) = find_signature(&text) {
            let rest = strip_signature(&text);
            if self.current.as_ref().map(Draft::key) != Some(signature.key()) {
                self.start(signature, None, None);
            }
            if rest.is_some_and(|r| r.split_whitespace().count() >= 3) {
                self.describe(text);
            }
            return;
        }

        if is_text_label(&text) {
            self.context = Context::from_label(&text);
            return;
        }
        self.describe(text);
    }

    fn code(&mut self, code: String) {
        if code.contains("curl ") {
            if let Some(curl) = parse_curl(&code) {
                if self.current.as_ref().map(Draft::key) != Some(curl.signature.key()) {
                    self.start(curl.signature, None, None);
                }
                if let Some(body) = curl.body.and_then(|b| parse_json(&b)) {
                    let context = Context {
                        kind: Some(ExampleKind::Request),
                        ..Context::default()
                    };
                    if let Some(draft) = self.current.as_mut() {
                        draft.add_example(body, &context);
                    }
                }
                return;
            }
        }

        let first_line = code.lines().next().unwrap_or("");
        if let Some(signature) = find_signature(first_line) {
            if self.current.as_ref().map(Draft::key) != Some(signature.key()) {
                self.start(signature, None, None);
            }
            let rest: String = code.lines().skip(1).collect::<Vec<_>>().join("\n");
            if let Some(body) = parse_json(&rest) {
                let context = Context {
                    kind: Some(ExampleKind::Request),
                    ..Context::default()
                };
                if let Some(draft) = self.current.as_mut() {
                    draft.add_example(body, &context);
                }
            }
            return;
        }

        if let (Some(payload), Some(draft)) = (parse_json(&code), self.current.as_mut()) {
            draft.add_example(payload, &self.context);
        }
    }

    fn table(&mut self, table: ParsedTable) {
        let Some(fields) = table_fields(&table) else {
            return;
        };
        match self.current.as_mut() {
            Some(draft) => draft.add_table(fields, &self.context),
            None => self.pending_tables.push((fields, self.context.clone())),
        }
    }

    fn describe(&mut self, text: String) {
        match self.current.as_mut() {
            Some(draft) => draft.description.push(text),
            None => self.pending_description.push(text),
        }
    }

    fn start(&mut self, signature: Signature, level: Option<u8>, summary: Option<String>) {
        if self.current.as_ref().map(Draft::key) == Some(signature.key()) {
            return;
        }
        self.close();

        let title = self.title.take();
        let anchor_level = level.or(title.as_ref().map(|(level, _)| *level));
        let summary = summary.or(title.map(|(_, text)| text));

        let mut draft = Draft::new(signature, anchor_level, summary);
        draft.description = std::mem::take(&mut self.pending_description);
        for (fields, context) in std::mem::take(&mut self.pending_tables) {
            draft.add_table(fields, &context);
        }
        self.context = Context::default();
        self.current = Some(draft);
    }

    fn close(&mut self) {
        if let Some(draft) = self.current.take() {
            self.drafts.push(draft);
        }
        self.context = Context::default();
    }
}

/// Text around a signature, or `None` when the signature is all there is
fn strip_signature(text: &str) -> Option<String> {
    let (start, end) = signature_span(text)?;
    let rest = format!("{} {}", &text[..start], &text[end..]);
    let rest = rest
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '|' | '–' | '—'))
        .to_string();
    (!rest.is_empty()).then_some(rest)
}

fn parse_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}
