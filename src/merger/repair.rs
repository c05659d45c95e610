//! Validation and repair of a merged document
//!
//! Every repair is recorded as a human-readable line for the run report.
//! Nothing here fails: a document that cannot be made consistent is made as
//! consistent as possible.

use crate::extractor::template_params;
use crate::openapi::{
    OpenApiDocument, Parameter, ParameterLocation, Requirement, ResponseSpec, Schema,
};
use std::collections::BTreeSet;

/// Repairs the document in place and describes each change
pub fn repair_document(document: &mut OpenApiDocument) -> Vec<String> {
    let mut repairs = Vec::new();

    for (name, schema) in document.components.iter_mut() {
        repairs.extend(schema.repair_required(&format!("components.{}", name)));
    }

    for (key, operation) in document.paths.iter_mut() {
        let at = key.to_string();

        if let Some(body) = operation.request_body.as_mut() {
            repairs.extend(body.repair_required(&format!("{} requestBody", at)));
        }
        for (status, response) in operation.responses.iter_mut() {
            if let Some(schema) = response.schema.as_mut() {
                repairs.extend(schema.repair_required(&format!("{} response {}", at, status)));
            }
        }
        for param in operation.parameters.iter_mut() {
            let param_at = format!("{} parameter {}", at, param.name);
            repairs.extend(param.schema.repair_required(&param_at));
        }

        let template: Vec<String> = template_params(&key.path);

        // Path parameters the template does not mention become query parameters
        let mut kept: Vec<Parameter> = Vec::with_capacity(operation.parameters.len());
        for mut param in std::mem::take(&mut operation.parameters) {
            if param.location == ParameterLocation::Path && !template.contains(&param.name) {
                let duplicate = kept
                    .iter()
                    .any(|p| p.name == param.name && p.location == ParameterLocation::Query);
                if duplicate {
                    repairs.push(format!(
                        "{}: dropped path parameter '{}' absent from the template",
                        at, param.name
                    ));
                    continue;
                }
                param.location = ParameterLocation::Query;
                repairs.push(format!(
                    "{}: path parameter '{}' is not in the template, moved to query",
                    at, param.name
                ));
            }
            kept.push(param);
        }
        operation.parameters = kept;

        for param in operation.parameters.iter_mut() {
            if param.location == ParameterLocation::Path && param.required != Requirement::Required {
                param.required = Requirement::Required;
                repairs.push(format!(
                    "{}: path parameter '{}' marked required",
                    at, param.name
                ));
            }
        }

        for name in &template {
            if operation.parameter(name, ParameterLocation::Path).is_none() {
                operation.parameters.push(Parameter::path(name.clone()));
                repairs.push(format!(
                    "{}: added missing path parameter '{}' with unknown type",
                    at, name
                ));
            }
        }

        if operation.responses.is_empty() {
            operation.responses.insert(
                "default".to_string(),
                ResponseSpec {
                    description: None,
                    schema: Some(Schema::Unknown),
                },
            );
            repairs.push(format!("{}: added default response with unknown schema", at));
        }
    }

    let known: BTreeSet<String> = document.components.keys().cloned().collect();
    for (name, schema) in document.components.iter_mut() {
        for dropped in schema.drop_dangling_refs(&known) {
            repairs.push(format!(
                "components.{}: dangling reference to '{}' replaced with unknown",
                name, dropped
            ));
        }
    }
    for (key, operation) in document.paths.iter_mut() {
        for schema in operation.schemas_mut() {
            for dropped in schema.drop_dangling_refs(&known) {
                repairs.push(format!(
                    "{}: dangling reference to '{}' replaced with unknown",
                    key, dropped
                ));
            }
        }
    }

    repairs
}
