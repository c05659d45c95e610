use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Prefix of a local component reference
pub const COMPONENT_REF_PREFIX: &str = "#/components/schemas/";

/// A best-effort sketch of a JSON payload shape
///
/// `Unknown` is an explicit marker for anything the documentation did not
/// state; it is never replaced by a guessed type. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Unknown,
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<Schema>),
    Object {
        properties: BTreeMap<String, Schema>,
        required: Vec<String>,
    },
    /// Reference to a named component
    Ref(String),
}

/// Two schemas that cannot both be true of the same payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConflict;

impl Schema {
    /// Object schema with no required list
    pub fn object(properties: BTreeMap<String, Schema>) -> Self {
        Schema::Object {
            properties,
            required: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Schema::Unknown)
    }

    /// Maps a documented type name to a schema
    ///
    /// Recognizes common English spellings and the Chinese type names seen on
    /// Chinese-language API portals. Unrecognized names stay `Unknown`.
    pub fn from_type_name(name: &str) -> Schema {
        let lower = name.trim().to_lowercase();
        let base = lower
            .split(|c: char| c == '(' || c == '<' || c == '[' || c.is_whitespace())
            .next()
            .unwrap_or("");

        if lower.ends_with("[]") || base.starts_with("array") || base.starts_with("list") {
            return Schema::Array(Box::new(Schema::Unknown));
        }

        match base {
            "string" | "str" | "text" | "char" | "varchar" | "date" | "datetime" | "uuid"
            | "url" | "email" | "字符串" | "文本" => Schema::String,
            "int" | "integer" | "long" | "int32" | "int64" | "short" | "整数" | "整型" => {
                Schema::Integer
            }
            "number" | "float" | "double" | "decimal" | "numeric" | "数字" | "数值" | "浮点数" => {
                Schema::Number
            }
            "bool" | "boolean" | "布尔" | "布尔值" => Schema::Boolean,
            "object" | "map" | "dict" | "hash" | "json" | "对象" => Schema::object(BTreeMap::new()),
            _ => Schema::Unknown,
        }
    }

    /// Infers a schema sketch from an example payload
    ///
    /// Requiredness of object members cannot be read off an example, so
    /// inferred objects carry no `required` list. `null` values and empty
    /// arrays give no type information and infer as `Unknown`.
    pub fn infer(value: &Value) -> Schema {
        match value {
            Value::Null => Schema::Unknown,
            Value::Bool(_) => Schema::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Schema::Integer,
            Value::Number(_) => Schema::Number,
            Value::String(_) => Schema::String,
            Value::Array(items) => Schema::Array(Box::new(
                items.first().map(Schema::infer).unwrap_or(Schema::Unknown),
            )),
            Value::Object(map) => Schema::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Schema::infer(v)))
                    .collect(),
            ),
        }
    }

    /// Combines two descriptions of the same payload
    ///
    /// Unknown parts are filled from the other side. Anything else must agree,
    /// including the property set of objects.
    pub fn reconcile(&self, other: &Schema) -> Result<Schema, SchemaConflict> {
        match (self, other) {
            (a, b) if a == b => Ok(a.clone()),
            (Schema::Unknown, b) => Ok(b.clone()),
            (a, Schema::Unknown) => Ok(a.clone()),
            (Schema::Array(a), Schema::Array(b)) => Ok(Schema::Array(Box::new(a.reconcile(b)?))),
            (
                Schema::Object {
                    properties: pa,
                    required: ra,
                },
                Schema::Object {
                    properties: pb,
                    required: rb,
                },
            ) => {
                if !pa.keys().eq(pb.keys()) {
                    return Err(SchemaConflict);
                }
                let mut properties = BTreeMap::new();
                for (name, a) in pa {
                    let b = &pb[name];
                    properties.insert(name.clone(), a.reconcile(b)?);
                }
                let mut required: Vec<String> = ra.iter().chain(rb.iter()).cloned().collect();
                required.sort();
                required.dedup();
                Ok(Schema::Object {
                    properties,
                    required,
                })
            }
            _ => Err(SchemaConflict),
        }
    }

    /// Collects every component name referenced from this schema
    pub fn collect_refs(&self, refs: &mut BTreeSet<String>) {
        match self {
            Schema::Ref(name) => {
                refs.insert(name.clone());
            }
            Schema::Array(items) => items.collect_refs(refs),
            Schema::Object { properties, .. } => {
                for schema in properties.values() {
                    schema.collect_refs(refs);
                }
            }
            _ => {}
        }
    }

    /// Rewrites component references through a rename map
    pub fn rename_refs(&mut self, renames: &HashMap<String, String>) {
        match self {
            Schema::Ref(name) => {
                if let Some(new_name) = renames.get(name) {
                    *name = new_name.clone();
                }
            }
            Schema::Array(items) => items.rename_refs(renames),
            Schema::Object { properties, .. } => {
                for schema in properties.values_mut() {
                    schema.rename_refs(renames);
                }
            }
            _ => {}
        }
    }

    /// Replaces references to unknown components with `Unknown`
    ///
    /// Returns the names that were dropped.
    pub fn drop_dangling_refs(&mut self, known: &BTreeSet<String>) -> Vec<String> {
        let mut dropped = Vec::new();
        self.drop_dangling_into(known, &mut dropped);
        dropped
    }

    fn drop_dangling_into(&mut self, known: &BTreeSet<String>, dropped: &mut Vec<String>) {
        match self {
            Schema::Ref(name) if !known.contains(name.as_str()) => {
                dropped.push(name.clone());
                *self = Schema::Unknown;
            }
            Schema::Array(items) => items.drop_dangling_into(known, dropped),
            Schema::Object { properties, .. } => {
                for schema in properties.values_mut() {
                    schema.drop_dangling_into(known, dropped);
                }
            }
            _ => {}
        }
    }

    /// Removes empty `required` lists and entries naming no property
    ///
    /// Returns a description of each change.
    pub fn repair_required(&mut self, at: &str) -> Vec<String> {
        let mut repairs = Vec::new();
        self.repair_required_into(at, &mut repairs);
        repairs
    }

    fn repair_required_into(&mut self, at: &str, repairs: &mut Vec<String>) {
        match self {
            Schema::Array(items) => items.repair_required_into(&format!("{}[]", at), repairs),
            Schema::Object {
                properties,
                required,
            } => {
                let before = required.len();
                required.retain(|name| properties.contains_key(name));
                if required.len() != before {
                    repairs.push(format!(
                        "{}: dropped {} required entr{} without a property",
                        at,
                        before - required.len(),
                        if before - required.len() == 1 { "y" } else { "ies" }
                    ));
                }
                for (name, schema) in properties.iter_mut() {
                    schema.repair_required_into(&format!("{}.{}", at, name), repairs);
                }
            }
            _ => {}
        }
    }

    /// Renders the schema as an OpenAPI schema object
    pub fn to_json(&self) -> Value {
        match self {
            Schema::Unknown => json!({ "x-unknown": true }),
            Schema::String => json!({ "type": "string" }),
            Schema::Integer => json!({ "type": "integer" }),
            Schema::Number => json!({ "type": "number" }),
            Schema::Boolean => json!({ "type": "boolean" }),
            Schema::Array(items) => json!({ "type": "array", "items": items.to_json() }),
            Schema::Object {
                properties,
                required,
            } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("object"));
                if !properties.is_empty() {
                    let props: Map<String, Value> = properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect();
                    obj.insert("properties".to_string(), Value::Object(props));
                }
                if !required.is_empty() {
                    obj.insert("required".to_string(), json!(required));
                }
                Value::Object(obj)
            }
            Schema::Ref(name) => json!({ "$ref": format!("{}{}", COMPONENT_REF_PREFIX, name) }),
        }
    }
}

/// Registers a schema under a name, deduplicating by structure
///
/// An identical schema already registered under `base` or one of its
/// suffixed names is reused. Otherwise the first free name of `base`,
/// `base2`, `base3`, ... is taken. Returns the name the schema lives under.
pub fn register_component(
    components: &mut BTreeMap<String, Schema>,
    base: &str,
    schema: Schema,
) -> String {
    let mut n = 1;
    loop {
        let candidate = if n == 1 {
            base.to_string()
        } else {
            format!("{}{}", base, n)
        };
        match components.get(&candidate) {
            Some(existing) if *existing == schema => return candidate,
            Some(_) => n += 1,
            None => {
                components.insert(candidate.clone(), schema);
                return candidate;
            }
        }
    }
}
