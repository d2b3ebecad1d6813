//! Pluggable response schema builders.
//!
//! A reference such as `P(User)` in a `@Response` or `@Property` annotation is
//! resolved by the builder registered under the code `P`. Builders are
//! registered by implementation name in the `schema_builders` setting and are
//! validated when the registry is created.

use crate::config::Settings;
use crate::document::Schema;
use crate::error::{Error, Result};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds a custom schema wrapping a model reference
pub trait SchemaBuilder: Send + Sync {
    /// Build the schema.
    ///
    /// # Arguments
    ///
    /// * `model_ref` - Full `#/components/schemas/...` reference of the model
    /// * `uri` - URI of the route being documented
    fn build(&self, model_ref: &str, uri: &str) -> Schema;
}

/// Implementation names accepted in `schema_builders`
pub const BUILTIN_BUILDERS: &[&str] = &["simple_paginate", "paginate"];

/// Simple pagination wrapper (`current_page`, `data`, `next_page_url`, ...)
#[derive(Debug, Clone)]
pub struct SimplePaginateBuilder {
    host: String,
}

impl SimplePaginateBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl SchemaBuilder for SimplePaginateBuilder {
    fn build(&self, model_ref: &str, uri: &str) -> Schema {
        let url = page_url(&self.host, uri);
        let mut schema = Schema::object();
        schema.required = Some(
            ["current_page", "data", "first_page_url", "path", "per_page"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );

        let properties = schema.properties.get_or_insert_with(BTreeMap::new);
        properties.insert("current_page".to_string(), with_example("integer", Value::from(2)));
        properties.insert("data".to_string(), Schema::array_of(Schema::reference(model_ref)));
        properties.insert(
            "first_page_url".to_string(),
            with_example("string", Value::from(format!("{}?page=1", url))),
        );
        properties.insert("from".to_string(), with_example("integer", Value::from(16)));
        properties.insert(
            "next_page_url".to_string(),
            with_example("string", Value::from(format!("{}?page=3", url))),
        );
        properties.insert("path".to_string(), with_example("string", Value::from(url.clone())));
        properties.insert("per_page".to_string(), with_example("integer", Value::from(15)));
        properties.insert(
            "prev_page_url".to_string(),
            with_example("string", Value::from(format!("{}?page=1", url))),
        );
        properties.insert("to".to_string(), with_example("integer", Value::from(30)));

        schema
    }
}

/// Length-aware pagination wrapper; adds `total`, `last_page` and
/// `last_page_url` to the simple wrapper
#[derive(Debug, Clone)]
pub struct PaginateBuilder {
    simple: SimplePaginateBuilder,
}

impl PaginateBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            simple: SimplePaginateBuilder::new(host),
        }
    }
}

impl SchemaBuilder for PaginateBuilder {
    fn build(&self, model_ref: &str, uri: &str) -> Schema {
        let url = page_url(&self.simple.host, uri);
        let mut schema = self.simple.build(model_ref, uri);

        for name in ["last_page", "last_page_url", "total"] {
            schema.mark_required(name);
        }

        let properties = schema.properties.get_or_insert_with(BTreeMap::new);
        properties.insert("last_page".to_string(), with_example("integer", Value::from(4)));
        properties.insert(
            "last_page_url".to_string(),
            with_example("string", Value::from(format!("{}?page=4", url))),
        );
        properties.insert("total".to_string(), with_example("integer", Value::from(50)));

        schema
    }
}

fn page_url(host: &str, uri: &str) -> String {
    let host = host.trim_end_matches('/');
    if uri.starts_with('/') {
        format!("{}{}", host, uri)
    } else {
        format!("{}/{}", host, uri)
    }
}

fn with_example(schema_type: &str, example: Value) -> Schema {
    let mut schema = Schema::typed(schema_type);
    schema.example = Some(example);
    schema
}

/// Builder code to implementation
#[derive(Default)]
pub struct SchemaBuilderRegistry {
    builders: BTreeMap<String, Box<dyn SchemaBuilder>>,
}

impl SchemaBuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the registry from the `schema_builders` setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchemaBuilder`] when a code points at an
    /// implementation name that does not exist.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut registry = Self::new();
        for (code, implementation) in &settings.schema_builders {
            let builder: Box<dyn SchemaBuilder> = match implementation.as_str() {
                "simple_paginate" => Box::new(SimplePaginateBuilder::new(settings.host.clone())),
                "paginate" => Box::new(PaginateBuilder::new(settings.host.clone())),
                _ => {
                    return Err(Error::UnknownSchemaBuilder {
                        code: code.clone(),
                        implementation: implementation.clone(),
                    })
                }
            };
            debug!("Registered schema builder {} => {}", code, implementation);
            registry.register(code.clone(), builder);
        }
        Ok(registry)
    }

    /// Register a custom builder, replacing any builder with the same code
    pub fn register(&mut self, code: impl Into<String>, builder: Box<dyn SchemaBuilder>) {
        self.builders.insert(code.into(), builder);
    }

    pub fn get(&self, code: &str) -> Option<&dyn SchemaBuilder> {
        self.builders.get(code).map(|b| b.as_ref())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for SchemaBuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaBuilderRegistry")
            .field("codes", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_simple_paginate_shape() {
        let builder = SimplePaginateBuilder::new("https://api.test/");
        let schema = builder.build("#/components/schemas/User", "users");
        let value = serde_json::to_value(&schema).unwrap();

        assert_eq!(value["type"], json!("object"));
        assert_eq!(
            value["required"],
            json!(["current_page", "data", "first_page_url", "path", "per_page"])
        );
        assert_eq!(value["properties"]["data"]["items"]["$ref"], json!("#/components/schemas/User"));
        assert_eq!(value["properties"]["path"]["example"], json!("https://api.test/users"));
        assert_eq!(
            value["properties"]["next_page_url"]["example"],
            json!("https://api.test/users?page=3")
        );
        assert!(value["properties"].get("total").is_none());
    }

    #[test]
    fn test_paginate_adds_length_fields() {
        let builder = PaginateBuilder::new("https://api.test");
        let schema = builder.build("#/components/schemas/User", "/users");
        let properties = schema.properties.as_ref().unwrap();
        assert!(properties.contains_key("total"));
        assert!(properties.contains_key("last_page"));
        assert_eq!(
            properties["last_page_url"].example,
            Some(json!("https://api.test/users?page=4"))
        );
        assert!(schema.required.as_ref().unwrap().contains(&"total".to_string()));
    }

    #[test]
    fn test_registry_from_default_settings() {
        let registry = SchemaBuilderRegistry::from_settings(&Settings::default()).unwrap();
        let codes: Vec<&str> = registry.codes().collect();
        assert_eq!(codes, vec!["P", "SP"]);
        assert!(registry.get("P").is_some());
        assert!(registry.get("X").is_none());
    }

    #[test]
    fn test_registry_rejects_unknown_implementation() {
        let mut settings = Settings::default();
        settings
            .schema_builders
            .insert("C".to_string(), "cursor_paginate".to_string());
        match SchemaBuilderRegistry::from_settings(&settings) {
            Err(Error::UnknownSchemaBuilder { code, implementation }) => {
                assert_eq!(code, "C");
                assert_eq!(implementation, "cursor_paginate");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_register_custom_builder() {
        struct Wrapped;
        impl SchemaBuilder for Wrapped {
            fn build(&self, model_ref: &str, _uri: &str) -> Schema {
                let mut schema = Schema::object();
                schema
                    .properties
                    .get_or_insert_with(BTreeMap::new)
                    .insert("item".to_string(), Schema::reference(model_ref));
                schema
            }
        }

        let mut registry = SchemaBuilderRegistry::new();
        registry.register("W", Box::new(Wrapped));
        let schema = registry.get("W").unwrap().build("#/components/schemas/Pet", "/pets");
        assert_eq!(
            schema.properties.unwrap()["item"].reference.as_deref(),
            Some("#/components/schemas/Pet")
        );
    }
}
