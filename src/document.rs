//! Typed OpenAPI 3.0 document tree.
//!
//! The orchestrator assembles one [`OpenApiDocument`] per generation pass. All
//! nodes serialize to the standard OpenAPI JSON/YAML shape; keys the typed
//! fields do not cover are kept in `extensions` maps so annotation overlays
//! never lose data.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix of every component schema reference
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    /// Servers the API is reachable on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// Declared tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// API paths keyed by OpenAPI path template
    pub paths: BTreeMap<String, PathItem>,
    /// Components (schemas, security schemes)
    #[serde(default)]
    pub components: Components,
}

/// OpenAPI Info object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// API version
    pub version: String,
}

/// OpenAPI Server object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI Tag object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// All operations of one path template, keyed by lowercase HTTP method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathItem {
    pub operations: BTreeMap<String, Operation>,
}

/// OpenAPI Operation object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub summary: String,
    pub description: String,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<BTreeMap<String, Vec<String>>>>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Operation {
    /// Merge an annotation value into the operation at a dotted key.
    ///
    /// `tags`, `responses.404.description` and `x-internal` are all valid keys.
    /// The operation is bridged through JSON for the merge, so a value that
    /// does not fit the typed field it lands on is an annotation error.
    pub fn merge_value(&mut self, key: &str, value: Value) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)?;
        set_dotted(&mut tree, key, value);
        *self = serde_json::from_value(tree).map_err(|e| Error::Annotation {
            body: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

/// Where a parameter lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    /// Request body; never serialized inside a [`Parameter`]
    Body,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Body => "body",
        }
    }
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Schema::is_empty")]
    pub schema: Schema,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation, schema: Schema) -> Self {
        Self {
            name: name.into(),
            location,
            required: false,
            description: None,
            schema,
            extensions: BTreeMap::new(),
        }
    }
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

/// OpenAPI MediaType object; `example`, `examples` and `encoding` stay in
/// `extensions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Schema::is_empty")]
    pub schema: Schema,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl MediaType {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            extensions: BTreeMap::new(),
        }
    }
}

/// OpenAPI Response object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Response {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Set the `application/json` schema of this response
    pub fn set_json_schema(&mut self, schema: Schema) {
        self.content
            .get_or_insert_with(BTreeMap::new)
            .insert("application/json".to_string(), MediaType::new(schema));
    }
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(
        rename = "securitySchemes",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

/// OpenAPI SecurityScheme object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flows: Option<BTreeMap<String, OAuthFlow>>,
}

/// One OAuth2 flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthFlow {
    #[serde(rename = "authorizationUrl", skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(rename = "tokenUrl", skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    pub scopes: BTreeMap<String, String>,
}

/// OpenAPI Schema object.
///
/// Used for component schemas as well as the transient property trees built
/// from validation rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

/// Array element schema.
///
/// Body trees are built with a `List` holding one slot per wildcard segment;
/// post-processing collapses it into `Single`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    List(Vec<Schema>),
    Single(Box<Schema>),
}

impl Schema {
    /// Schema with only a `type`
    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    /// `$ref` schema; bare names are expanded to component references
    pub fn reference(target: &str) -> Self {
        Self {
            reference: Some(schema_ref_path(target)),
            ..Default::default()
        }
    }

    /// `{type: array, items: ...}`
    pub fn array_of(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Items::Single(Box::new(items))),
            ..Default::default()
        }
    }

    /// `{type: object, properties: {}}`
    pub fn object() -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: Some(BTreeMap::new()),
            ..Default::default()
        }
    }

    /// True for `{}`
    pub fn is_empty(&self) -> bool {
        *self == Schema::default()
    }

    pub fn type_name(&self) -> Option<&str> {
        self.schema_type.as_deref()
    }

    pub fn is_type(&self, schema_type: &str) -> bool {
        self.type_name() == Some(schema_type)
    }

    /// The element schema of an array, whichever shape `items` has
    pub fn item_schema(&self) -> Option<&Schema> {
        match self.items.as_ref()? {
            Items::Single(schema) => Some(schema),
            Items::List(list) => list.first(),
        }
    }

    /// Add a name to `required`, keeping it unique
    pub fn mark_required(&mut self, name: &str) {
        let required = self.required.get_or_insert_with(Vec::new);
        if !required.iter().any(|r| r == name) {
            required.push(name.to_string());
        }
    }
}

/// Expand a bare model name to `#/components/schemas/Name`
pub fn schema_ref_path(target: &str) -> String {
    if target.starts_with(SCHEMA_REF_PREFIX) {
        target.to_string()
    } else {
        format!("{}{}", SCHEMA_REF_PREFIX, target)
    }
}

/// Set `value` at a dotted path inside a JSON tree, creating objects on the way.
///
/// Numeric segments index into existing arrays (or append when equal to the
/// length); anything else turns the node into an object.
pub fn set_dotted(target: &mut Value, path: &str, value: Value) {
    let mut current = target;
    let segments: Vec<&str> = path.split('.').collect();

    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();

        let array_index = match &*current {
            Value::Array(list) => segment
                .parse::<usize>()
                .ok()
                .filter(|index| *index <= list.len()),
            _ => None,
        };
        if let Some(index) = array_index {
            if let Value::Array(list) = current {
                if index == list.len() {
                    list.push(Value::Null);
                }
                if last {
                    list[index] = value;
                    return;
                }
                current = &mut list[index];
                continue;
            }
            unreachable!();
        }

        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if last {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_set_dotted_creates_nested_objects() {
        let mut tree = json!({});
        set_dotted(&mut tree, "a.b.c", json!(1));
        assert_eq!(tree, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_dotted_indexes_arrays() {
        let mut tree = json!({"list": [{"x": 1}]});
        set_dotted(&mut tree, "list.0.y", json!(2));
        set_dotted(&mut tree, "list.1", json!("new"));
        assert_eq!(tree, json!({"list": [{"x": 1, "y": 2}, "new"]}));
    }

    #[test]
    fn test_merge_value_into_typed_fields() {
        let mut operation = Operation::default();
        operation.merge_value("tags", json!(["Users"])).unwrap();
        operation.merge_value("summary", json!("List users")).unwrap();
        operation
            .merge_value("responses.404.description", json!("Missing"))
            .unwrap();
        operation.merge_value("x-internal", json!(true)).unwrap();

        assert_eq!(operation.tags, vec!["Users".to_string()]);
        assert_eq!(operation.summary, "List users");
        assert_eq!(operation.responses["404"].description, "Missing");
        assert_eq!(operation.extensions["x-internal"], json!(true));
    }

    #[test]
    fn test_merge_value_accepts_cookie_parameter() {
        let mut operation = Operation::default();
        operation
            .merge_value(
                "parameters",
                json!([{"name": "sid", "in": "cookie", "required": true, "schema": {"type": "string"}}]),
            )
            .unwrap();

        assert_eq!(operation.parameters[0].location, ParameterLocation::Cookie);
        assert_eq!(
            serde_json::to_value(&operation.parameters[0]).unwrap(),
            json!({"name": "sid", "in": "cookie", "required": true, "schema": {"type": "string"}})
        );
    }

    #[test]
    fn test_merge_value_keeps_content_without_schema() {
        let mut operation = Operation::default();
        operation
            .merge_value(
                "responses",
                json!({"204": {"description": "x", "content": {"text/plain": {"example": "ok"}}}}),
            )
            .unwrap();
        operation
            .merge_value("requestBody", json!({"description": "raw upload"}))
            .unwrap();

        let value = serde_json::to_value(&operation).unwrap();
        assert_eq!(
            value["responses"]["204"],
            json!({"description": "x", "content": {"text/plain": {"example": "ok"}}})
        );
        assert_eq!(value["requestBody"], json!({"description": "raw upload", "content": {}}));
    }

    #[test]
    fn test_merge_value_rejects_mistyped_field() {
        let mut operation = Operation::default();
        let result = operation.merge_value("deprecated", json!("yes"));
        assert!(matches!(result, Err(Error::Annotation { .. })));
    }

    #[test]
    fn test_schema_serialization_shape() {
        let mut schema = Schema::array_of(Schema::reference("User"));
        schema.description = Some("users".to_string());
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "array",
                "description": "users",
                "items": {"$ref": "#/components/schemas/User"}
            })
        );
    }

    #[test]
    fn test_items_deserialize_both_shapes() {
        let single: Schema = serde_json::from_value(json!({"type": "array", "items": {"type": "string"}})).unwrap();
        assert!(matches!(single.items, Some(Items::Single(_))));

        let list: Schema = serde_json::from_value(json!({"type": "array", "items": [{"type": "string"}]})).unwrap();
        assert!(matches!(list.items, Some(Items::List(_))));
        assert_eq!(list.item_schema().unwrap().type_name(), Some("string"));
    }

    #[test]
    fn test_schema_keeps_unknown_keys() {
        let schema: Schema = serde_json::from_value(json!({"type": "string", "pattern": "^a"})).unwrap();
        assert_eq!(schema.extensions["pattern"], json!("^a"));
        assert_eq!(serde_json::to_value(&schema).unwrap(), json!({"type": "string", "pattern": "^a"}));
    }

    #[test]
    fn test_schema_ref_path_is_idempotent() {
        assert_eq!(schema_ref_path("User"), "#/components/schemas/User");
        assert_eq!(schema_ref_path("#/components/schemas/User"), "#/components/schemas/User");
    }
}
