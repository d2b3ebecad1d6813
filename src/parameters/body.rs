use super::{collapse_items, rule_schema, ParameterFragment, ParametersGenerator};
use crate::document::{Items, MediaType, ParameterLocation, RequestBody, Schema};
use crate::error::Result;
use crate::rules::{FieldRules, RuleSet};
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const JSON_MEDIA_TYPE: &str = "application/json";
const MULTIPART_MEDIA_TYPE: &str = "multipart/form-data";

/// Request body from validation rules.
///
/// Dotted field paths build a property tree: ordinary segments are objects,
/// `*` segments are arrays with one element slot. A file rule anywhere at the
/// top level (directly or as an array element) switches the body to
/// `multipart/form-data`.
pub struct BodyParametersGenerator<'a> {
    rules: &'a Map<String, Value>,
}

impl<'a> BodyParametersGenerator<'a> {
    pub fn new(rules: &'a Map<String, Value>) -> Self {
        Self { rules }
    }

    /// Build the body schema and pick its media type
    pub fn schema(&self) -> Result<(String, Schema)> {
        let rules = RuleSet::parse(self.rules)?;
        let mut root = Schema::object();

        for field in rules.iter() {
            let tokens: Vec<&str> = field.field.split('.').collect();
            add_to_properties(&mut root, &tokens, field);
            if field.is_required() {
                mark_required(&mut root, &tokens);
            }
        }

        if let Some(properties) = &mut root.properties {
            collapse_items(properties);
        }

        let multipart = root
            .properties
            .iter()
            .flat_map(|p| p.values())
            .any(|property| is_binary(property) || property.item_schema().map(is_binary).unwrap_or(false));
        let media_type = if multipart {
            MULTIPART_MEDIA_TYPE
        } else {
            JSON_MEDIA_TYPE
        };

        debug!("Generated {} body schema for {} rules", media_type, rules.len());
        Ok((media_type.to_string(), root))
    }
}

impl ParametersGenerator for BodyParametersGenerator<'_> {
    fn parameters(&self) -> Result<ParameterFragment> {
        let (media_type, schema) = self.schema()?;
        let mut content = BTreeMap::new();
        content.insert(media_type, MediaType::new(schema));
        Ok(ParameterFragment::RequestBody(RequestBody {
            content,
            ..Default::default()
        }))
    }

    fn location(&self) -> ParameterLocation {
        ParameterLocation::Body
    }
}

fn is_binary(schema: &Schema) -> bool {
    schema.format.as_deref() == Some("binary")
}

/// Container type implied by the segment following the current one
fn nested_type(next: &str) -> &'static str {
    if next == "*" {
        "array"
    } else {
        "object"
    }
}

fn add_to_properties(parent: &mut Schema, tokens: &[&str], field: &FieldRules) {
    let Some((&token, rest)) = tokens.split_first() else {
        return;
    };
    let schema_type = match rest.first() {
        Some(next) => nested_type(next),
        None => field.schema_type(),
    };

    let child = if token == "*" {
        let items = parent.items.get_or_insert_with(|| Items::List(Vec::new()));
        match items {
            Items::List(list) => {
                if list.is_empty() {
                    list.push(new_property(schema_type, rest.is_empty(), field));
                } else {
                    upgrade(&mut list[0], schema_type);
                }
                &mut list[0]
            }
            Items::Single(item) => {
                upgrade(item, schema_type);
                item.as_mut()
            }
        }
    } else {
        let properties = parent.properties.get_or_insert_with(BTreeMap::new);
        match properties.get_mut(token) {
            Some(existing) if rest.is_empty() && is_populated(existing) => {}
            Some(existing) => upgrade(existing, schema_type),
            None => {
                properties.insert(
                    token.to_string(),
                    new_property(schema_type, rest.is_empty(), field),
                );
            }
        }
        match properties.get_mut(token) {
            Some(child) => child,
            None => return,
        }
    };

    add_to_properties(child, rest, field);
}

/// New node: a full rule schema for a leaf, a bare container otherwise
fn new_property(schema_type: &str, leaf: bool, field: &FieldRules) -> Schema {
    if leaf {
        return rule_schema(field);
    }
    let mut schema = Schema::typed(schema_type);
    ensure_container(&mut schema);
    schema
}

/// Existing nodes only get their type upgraded
fn upgrade(schema: &mut Schema, schema_type: &str) {
    schema.schema_type = Some(schema_type.to_string());
    if schema_type == "object" {
        schema.items = None;
    }
    ensure_container(schema);
}

/// A container already filled by deeper rules keeps its shape when a
/// shorter rule reaches it later
fn is_populated(schema: &Schema) -> bool {
    schema.properties.as_ref().map(|p| !p.is_empty()).unwrap_or(false)
        || matches!(&schema.items, Some(Items::List(list)) if !list.is_empty())
}

fn ensure_container(schema: &mut Schema) {
    match schema.type_name() {
        Some("array") if schema.items.is_none() => schema.items = Some(Items::List(Vec::new())),
        Some("object") if schema.properties.is_none() => {
            schema.properties = Some(BTreeMap::new())
        }
        _ => {}
    }
}

/// Mark the leaf required in its enclosing object, then each enclosing
/// object segment in its own parent, up to the first `*` segment.
///
/// Returns whether the caller should keep propagating.
fn mark_required(parent: &mut Schema, tokens: &[&str]) -> bool {
    let Some((&token, rest)) = tokens.split_first() else {
        return false;
    };

    if token == "*" {
        if !rest.is_empty() {
            if let Some(element) = element_mut(parent) {
                mark_required(element, rest);
            }
        }
        return false;
    }

    let propagate = rest.is_empty()
        || parent
            .properties
            .as_mut()
            .and_then(|p| p.get_mut(token))
            .map(|child| mark_required(child, rest))
            .unwrap_or(false);

    if propagate {
        parent.mark_required(token);
    }
    propagate
}

fn element_mut(schema: &mut Schema) -> Option<&mut Schema> {
    match schema.items.as_mut()? {
        Items::List(list) => list.first_mut(),
        Items::Single(item) => Some(item.as_mut()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn body(rules: Value) -> Result<(String, Value)> {
        let Value::Object(map) = rules else {
            panic!("rules must be an object");
        };
        let (media_type, schema) = BodyParametersGenerator::new(&map).schema()?;
        Ok((media_type, serde_json::to_value(schema).unwrap()))
    }

    #[test]
    fn test_nested_object_with_nested_required() {
        let (media_type, schema) = body(json!({
            "a.b": "required|string",
            "a.c": "integer"
        }))
        .unwrap();

        assert_eq!(media_type, "application/json");
        let a = &schema["properties"]["a"];
        assert_eq!(a["type"], json!("object"));
        assert_eq!(a["properties"]["b"]["type"], json!("string"));
        assert_eq!(a["properties"]["c"]["type"], json!("integer"));
        assert_eq!(a["required"], json!(["b"]));
        assert_eq!(schema["required"], json!(["a"]));
    }

    #[test]
    fn test_wildcard_array_of_objects() {
        let (_, schema) = body(json!({"items.*.id": "required|integer"})).unwrap();

        let items = &schema["properties"]["items"];
        assert_eq!(items["type"], json!("array"));
        assert_eq!(items["items"]["type"], json!("object"));
        assert_eq!(items["items"]["properties"]["id"]["type"], json!("integer"));
        assert_eq!(items["items"]["required"], json!(["id"]));
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn test_existing_property_keeps_siblings() {
        let (_, schema) = body(json!({
            "address": "required|array",
            "address.city": "string",
            "address.zip": "required|string|max:10"
        }))
        .unwrap();

        let address = &schema["properties"]["address"];
        assert_eq!(address["type"], json!("object"));
        assert_eq!(address["properties"]["city"]["type"], json!("string"));
        assert_eq!(address["properties"]["zip"]["maxLength"], json!(10));
        assert_eq!(address["required"], json!(["zip"]));
        assert_eq!(schema["required"], json!(["address"]));
    }

    #[test]
    fn test_scalar_array_and_plain_array() {
        let (_, schema) = body(json!({
            "tags": "array",
            "scores.*": "numeric|swagger_example:2.5"
        }))
        .unwrap();

        assert_eq!(schema["properties"]["tags"]["items"], json!({"type": "string"}));
        assert_eq!(schema["properties"]["scores"]["items"]["type"], json!("number"));
        assert_eq!(schema["properties"]["scores"]["items"]["example"], json!(2.5));
    }

    #[test]
    fn test_leaf_extras() {
        let (_, schema) = body(json!({
            "status": "required|string|in:draft,live|swagger_default:draft",
            "rating": "nullable|integer|min:1|max:5"
        }))
        .unwrap();

        let status = &schema["properties"]["status"];
        assert_eq!(status["enum"], json!(["draft", "live"]));
        assert_eq!(status["default"], json!("draft"));
        assert_eq!(status["example"], json!("string"));

        let rating = &schema["properties"]["rating"];
        assert_eq!(rating["nullable"], json!(true));
        assert_eq!(rating["minimum"], json!(1));
        assert_eq!(rating["maximum"], json!(5));
        assert_eq!(schema["required"], json!(["status"]));
    }

    #[test]
    fn test_file_rules_switch_to_multipart() {
        let (media_type, schema) = body(json!({"avatar": "required|image"})).unwrap();
        assert_eq!(media_type, "multipart/form-data");
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"]["avatar"]["format"], json!("binary"));

        let (media_type, _) = body(json!({"attachments.*": "file"})).unwrap();
        assert_eq!(media_type, "multipart/form-data");
    }

    #[test]
    fn test_request_body_fragment() {
        let rules = json!({"name": "required|string"});
        let ParameterFragment::RequestBody(request_body) =
            BodyParametersGenerator::new(rules.as_object().unwrap()).parameters().unwrap()
        else {
            panic!("expected a request body");
        };
        assert!(request_body.content.contains_key("application/json"));
    }

    #[test]
    fn test_malformed_rule() {
        match body(json!({"items.*.id": {"type": "integer"}})) {
            Err(Error::MalformedRule { field, rule }) => {
                assert_eq!(field, "items.*.id");
                assert_eq!(rule, r#"{"type":"integer"}"#);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
