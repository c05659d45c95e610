//! OpenAPI data model
//!
//! Types shared by the extractor, the merger and the output layer:
//! - [`ApiFragment`]: what one documentation page says about the API
//! - [`OpenApiDocument`]: the merged result, with provenance per operation
//! - [`Schema`]: payload sketches with an explicit unknown marker

mod model;
mod render;
mod schema;

pub use model::{
    ApiFragment, ApiInfo, Example, ExampleKind, HttpMethod, OpenApiDocument, OperationKey,
    OperationSpec, Parameter, ParameterLocation, ProvenanceRecord, Requirement, ResponseSpec,
};
pub use render::OPENAPI_VERSION;
pub use schema::{register_component, Schema, SchemaConflict, COMPONENT_REF_PREFIX};
