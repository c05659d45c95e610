use crate::openapi::model::{
    ExampleKind, OpenApiDocument, OperationKey, OperationSpec, Parameter, ParameterLocation,
    ProvenanceRecord, Requirement,
};
use serde_json::{json, Map, Value};

/// OpenAPI version emitted for synthesized documents
pub const OPENAPI_VERSION: &str = "3.0.3";

impl OpenApiDocument {
    /// Renders the document as OpenAPI 3 JSON
    ///
    /// Provenance is attached to each operation as `x-source-urls` and
    /// `x-requires-manual-review`. Body-located parameters are carried by the
    /// request body schema and are not repeated under `parameters`.
    pub fn to_json(&self) -> Value {
        let mut info = Map::new();
        info.insert("title".to_string(), json!(self.info.title));
        info.insert("version".to_string(), json!(self.info.version));
        if let Some(description) = &self.info.description {
            info.insert("description".to_string(), json!(description));
        }

        let mut paths = Map::new();
        for (key, operation) in &self.paths {
            let item = paths
                .entry(key.path.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(item) = item {
                item.insert(
                    key.method.as_str().to_string(),
                    render_operation(operation, self.provenance.get(key)),
                );
            }
        }

        let schemas: Map<String, Value> = self
            .components
            .iter()
            .map(|(name, schema)| (name.clone(), schema.to_json()))
            .collect();

        let mut doc = Map::new();
        doc.insert("openapi".to_string(), json!(OPENAPI_VERSION));
        doc.insert("info".to_string(), Value::Object(info));
        if !self.servers.is_empty() {
            let servers: Vec<Value> = self.servers.iter().map(|s| json!({ "url": s })).collect();
            doc.insert("servers".to_string(), Value::Array(servers));
        }
        doc.insert("paths".to_string(), Value::Object(paths));
        doc.insert("components".to_string(), json!({ "schemas": schemas }));
        Value::Object(doc)
    }

    /// Keys of operations flagged for manual review
    pub fn flagged_operations(&self) -> Vec<&OperationKey> {
        self.provenance
            .iter()
            .filter(|(_, p)| p.requires_manual_review)
            .map(|(k, _)| k)
            .collect()
    }
}

fn render_operation(operation: &OperationSpec, provenance: Option<&ProvenanceRecord>) -> Value {
    let mut op = Map::new();

    if let Some(summary) = &operation.summary {
        op.insert("summary".to_string(), json!(summary));
    }
    if let Some(description) = &operation.description {
        op.insert("description".to_string(), json!(description));
    }

    let parameters: Vec<Value> = operation
        .parameters
        .iter()
        .filter(|p| p.location != ParameterLocation::Body)
        .map(render_parameter)
        .collect();
    if !parameters.is_empty() {
        op.insert("parameters".to_string(), Value::Array(parameters));
    }

    if let Some(body) = &operation.request_body {
        let mut media = Map::new();
        media.insert("schema".to_string(), body.to_json());
        if let Some(example) = operation
            .examples
            .iter()
            .find(|e| e.kind == ExampleKind::Request)
        {
            media.insert("example".to_string(), example.payload.clone());
        }
        op.insert(
            "requestBody".to_string(),
            json!({ "content": { "application/json": Value::Object(media) } }),
        );
    }

    let mut responses = Map::new();
    for (status, response) in &operation.responses {
        let mut rendered = Map::new();
        rendered.insert(
            "description".to_string(),
            json!(response.description.clone().unwrap_or_else(|| "Undocumented".to_string())),
        );
        if let Some(schema) = &response.schema {
            let mut media = Map::new();
            media.insert("schema".to_string(), schema.to_json());
            if let Some(example) = operation.examples.iter().find(|e| {
                e.kind == ExampleKind::Response && e.status.as_deref() == Some(status.as_str())
            }) {
                media.insert("example".to_string(), example.payload.clone());
            }
            rendered.insert(
                "content".to_string(),
                json!({ "application/json": Value::Object(media) }),
            );
        }
        responses.insert(status.clone(), Value::Object(rendered));
    }
    op.insert("responses".to_string(), Value::Object(responses));

    if let Some(provenance) = provenance {
        op.insert("x-source-urls".to_string(), json!(provenance.sources));
        op.insert(
            "x-requires-manual-review".to_string(),
            json!(provenance.requires_manual_review),
        );
    }

    Value::Object(op)
}

fn render_parameter(parameter: &Parameter) -> Value {
    let mut p = Map::new();
    p.insert("name".to_string(), json!(parameter.name));
    p.insert("in".to_string(), json!(parameter.location.as_str()));
    match parameter.required {
        Requirement::Required => {
            p.insert("required".to_string(), json!(true));
        }
        Requirement::Optional => {
            p.insert("required".to_string(), json!(false));
        }
        Requirement::Unknown => {
            p.insert("x-required-unknown".to_string(), json!(true));
        }
    }
    if let Some(description) = &parameter.description {
        p.insert("description".to_string(), json!(description));
    }
    p.insert("schema".to_string(), parameter.schema.to_json());
    Value::Object(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::model::{ApiInfo, HttpMethod, ResponseSpec};
    use crate::openapi::schema::Schema;

    fn sample_document() -> OpenApiDocument {
        let mut doc = OpenApiDocument::new(ApiInfo::for_site("https://docs.example.com/", None));
        let key = OperationKey::new("/users/{id}", HttpMethod::Get);
        let mut op = OperationSpec {
            summary: Some("Get a user".to_string()),
            ..Default::default()
        };
        op.parameters.push(Parameter::path("id"));
        op.parameters.push(Parameter::new("verbose", ParameterLocation::Query));
        op.responses.insert(
            "200".to_string(),
            ResponseSpec {
                description: None,
                schema: Some(Schema::Ref("User".to_string())),
            },
        );
        doc.paths.insert(key.clone(), op);
        doc.components.insert(
            "User".to_string(),
            Schema::Object {
                properties: [("id".to_string(), Schema::Integer)].into(),
                required: vec![],
            },
        );
        doc.provenance.insert(
            key,
            ProvenanceRecord {
                sources: vec!["https://docs.example.com/users".to_string()],
                requires_manual_review: false,
            },
        );
        doc
    }

    #[test]
    fn test_render_operation_shape() {
        let json = sample_document().to_json();
        let op = &json["paths"]["/users/{id}"]["get"];

        assert_eq!(json["openapi"], OPENAPI_VERSION);
        assert_eq!(json["info"]["title"], "API Documentation");
        assert_eq!(op["summary"], "Get a user");
        assert_eq!(op["parameters"][0]["in"], "path");
        assert_eq!(op["parameters"][0]["required"], true);
        assert_eq!(op["parameters"][1]["x-required-unknown"], true);
        assert_eq!(op["parameters"][1]["schema"]["x-unknown"], true);
        assert_eq!(
            op["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/User"
        );
        assert_eq!(op["x-source-urls"][0], "https://docs.example.com/users");
        assert_eq!(op["x-requires-manual-review"], false);
    }

    #[test]
    fn test_body_parameters_not_listed() {
        let mut doc = sample_document();
        let key = OperationKey::new("/users/{id}", HttpMethod::Get);
        if let Some(op) = doc.paths.get_mut(&key) {
            op.parameters.push(Parameter::new("name", ParameterLocation::Body));
        }
        let json = doc.to_json();
        let params = json["paths"]["/users/{id}"]["get"]["parameters"]
            .as_array()
            .unwrap();
        assert_eq!(params.len(), 2);
    }
}
