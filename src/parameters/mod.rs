//! Parameter generators.
//!
//! Each generator turns one source of request data into an OpenAPI fragment:
//! path placeholders become path parameters, validation rules become query
//! parameters for read methods and a request body for write methods.

pub mod body;
pub mod path;
pub mod query;

pub use body::BodyParametersGenerator;
pub use path::PathParametersGenerator;
pub use query::QueryParametersGenerator;

use crate::document::{Items, Parameter, ParameterLocation, RequestBody, Schema};
use crate::error::Result;
use crate::extractor::HttpMethod;
use crate::rules::FieldRules;
use crate::type_mapper::{coerce_value, example_for};
use serde_json::{Map, Value};

/// Output of a generator
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterFragment {
    Parameters(Vec<Parameter>),
    RequestBody(RequestBody),
}

/// Common interface of the path, query and body generators
pub trait ParametersGenerator {
    fn parameters(&self) -> Result<ParameterFragment>;

    fn location(&self) -> ParameterLocation;
}

/// Pick the generator for a method's validation rules: a body for
/// `POST`, `PUT` and `PATCH`, query parameters otherwise.
pub fn rules_generator<'a>(
    method: HttpMethod,
    rules: &'a Map<String, Value>,
) -> Box<dyn ParametersGenerator + 'a> {
    if method.has_body() {
        Box::new(BodyParametersGenerator::new(rules))
    } else {
        Box::new(QueryParametersGenerator::new(rules))
    }
}

/// Leaf schema described by one field's rules.
///
/// Carries type, format, enum, bounds, nullability and the coerced
/// `swagger_*` default, example and description. An example is generated
/// when none is given.
pub(crate) fn rule_schema(rules: &FieldRules) -> Schema {
    let schema_type = rules.schema_type();
    let mut schema = Schema::typed(schema_type);
    schema.format = rules.format().map(str::to_string);

    if let Some(values) = rules.enum_values() {
        schema.enum_values = Some(values.iter().map(|v| coerce_value(v, schema_type)).collect());
    }

    apply_bounds(&mut schema, rules);

    if rules.is_nullable() {
        schema.nullable = Some(true);
    }
    if let Some(default) = rules.swagger_default() {
        schema.default = Some(coerce_value(default, schema_type));
    }
    if let Some(description) = rules.swagger_description() {
        schema.description = Some(description.to_string());
    }
    schema.example = match rules.swagger_example() {
        Some(example) => Some(coerce_value(example, schema_type)),
        None => example_for(schema_type, schema.format.as_deref()),
    };

    if schema_type == "array" {
        schema.items = Some(Items::List(Vec::new()));
    } else if schema_type == "object" {
        schema.properties = Some(Default::default());
    }

    schema
}

fn apply_bounds(schema: &mut Schema, rules: &FieldRules) {
    let schema_type = rules.schema_type();
    let as_count = |raw: &str| raw.trim().parse::<u64>().ok();

    match schema_type {
        "string" => {
            schema.min_length = rules.min().and_then(as_count);
            schema.max_length = rules.max().and_then(as_count);
        }
        "array" => {
            schema.min_items = rules.min().and_then(as_count);
            schema.max_items = rules.max().and_then(as_count);
        }
        "integer" | "number" => {
            schema.minimum = rules.min().map(|v| coerce_value(v, schema_type));
            schema.maximum = rules.max().map(|v| coerce_value(v, schema_type));
        }
        _ => {}
    }

    let bound_type = if matches!(schema_type, "integer" | "number") {
        schema_type
    } else {
        "number"
    };
    if let Some(bound) = rules.swagger_min() {
        schema.minimum = Some(coerce_value(&bound.value, bound_type));
    }
    if let Some(bound) = rules.swagger_max() {
        schema.maximum = Some(coerce_value(&bound.value, bound_type));
    }
}

/// Collapse `items` lists left by wildcard construction into a single schema.
///
/// An empty list becomes `{type: string}`, a non-empty one its first slot.
/// Nested objects and array elements are visited too; running it twice
/// changes nothing.
pub fn collapse_items(properties: &mut std::collections::BTreeMap<String, Schema>) {
    for schema in properties.values_mut() {
        collapse_schema(schema);
    }
}

fn collapse_schema(schema: &mut Schema) {
    if let Some(Items::List(list)) = &mut schema.items {
        let first = if list.is_empty() {
            Schema::typed("string")
        } else {
            list.swap_remove(0)
        };
        schema.items = Some(Items::Single(Box::new(first)));
    }

    if let Some(Items::Single(item)) = &mut schema.items {
        collapse_schema(item);
    }
    if let Some(properties) = &mut schema.properties {
        collapse_items(properties);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_rule;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn field(spec: &str) -> FieldRules {
        FieldRules::new("field", parse_rule("field", &json!(spec)).unwrap())
    }

    #[test]
    fn test_rule_schema_for_integer() {
        let schema = rule_schema(&field("required|integer|min:1|max:10|swagger_default:5"));
        assert_eq!(schema.type_name(), Some("integer"));
        assert_eq!(schema.minimum, Some(json!(1)));
        assert_eq!(schema.maximum, Some(json!(10)));
        assert_eq!(schema.default, Some(json!(5)));
        assert_eq!(schema.example, Some(json!(1)));
    }

    #[test]
    fn test_rule_schema_for_string() {
        let schema = rule_schema(&field(
            "nullable|string|max:255|in:draft,published|swagger_example:draft|swagger_description:Post state, visible to users",
        ));
        assert_eq!(schema.type_name(), Some("string"));
        assert_eq!(schema.max_length, Some(255));
        assert_eq!(schema.enum_values, Some(vec![json!("draft"), json!("published")]));
        assert_eq!(schema.nullable, Some(true));
        assert_eq!(schema.example, Some(json!("draft")));
        assert_eq!(schema.description.as_deref(), Some("Post state, visible to users"));
    }

    #[test]
    fn test_rule_schema_swagger_bounds_are_coerced() {
        let schema = rule_schema(&field("integer|swagger_min:5:fail|swagger_max:9"));
        assert_eq!(schema.minimum, Some(json!(5)));
        assert_eq!(schema.maximum, Some(json!(9)));
    }

    #[test]
    fn test_rule_schema_explicit_example_is_coerced() {
        let schema = rule_schema(&field("boolean|swagger_example:false"));
        assert_eq!(schema.example, Some(json!(false)));
    }

    #[test]
    fn test_collapse_items_is_idempotent() {
        let mut properties = BTreeMap::new();
        let mut tags = Schema::typed("array");
        tags.items = Some(Items::List(vec![Schema::typed("string")]));
        properties.insert("tags".to_string(), tags);
        let mut empty = Schema::typed("array");
        empty.items = Some(Items::List(Vec::new()));
        properties.insert("ids".to_string(), empty);

        collapse_items(&mut properties);
        let once = properties.clone();
        assert_eq!(
            serde_json::to_value(&properties["tags"]).unwrap(),
            json!({"type": "array", "items": {"type": "string"}})
        );
        assert_eq!(
            serde_json::to_value(&properties["ids"]).unwrap(),
            json!({"type": "array", "items": {"type": "string"}})
        );

        collapse_items(&mut properties);
        assert_eq!(properties, once);
    }

    #[test]
    fn test_rules_generator_by_method() {
        let rules = Map::new();
        assert_eq!(rules_generator(HttpMethod::Post, &rules).location(), ParameterLocation::Body);
        assert_eq!(rules_generator(HttpMethod::Get, &rules).location(), ParameterLocation::Query);
        assert_eq!(rules_generator(HttpMethod::Delete, &rules).location(), ParameterLocation::Query);
    }
}
