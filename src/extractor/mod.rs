//! Application introspection interfaces.
//!
//! The synthesis engine never looks at a live application. Everything it
//! knows comes through three traits:
//!
//! - [`RouteTable`] lists the application's routes in registration order;
//! - [`HandlerResolver`] turns a route action into doc-comment and validation
//!   rule metadata;
//! - [`EntityIntrospector`] describes data models and custom schema classes.
//!
//! Two implementations ship with the crate: [`manifest::AppManifest`], read
//! from a YAML or JSON export of the application, and
//! [`source::SourceIntrospector`], which scans Rust sources with `syn`.
//! [`ChainedResolver`] combines several resolvers.
//!
//! # Example
//!
//! ```no_run
//! use openapi_synth::extractor::{manifest::AppManifest, RouteTable};
//! use std::path::Path;
//!
//! let manifest = AppManifest::load(Path::new("app.yaml")).unwrap();
//! for route in manifest.routes() {
//!     println!("{:?} {}", route.methods, route.uri);
//! }
//! ```

pub mod manifest;
pub mod source;

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Ordered source of routes
pub trait RouteTable {
    fn routes(&self) -> Vec<RouteDescriptor>;
}

/// Resolves a route action (`Type@method` or `path::Type::method`) to its
/// handler metadata. Closures and unknown actions resolve to `None`.
pub trait HandlerResolver {
    fn resolve(&self, action: &str) -> Option<HandlerMetadata>;
}

/// Describes data models and custom schema classes
pub trait EntityIntrospector {
    fn models(&self) -> Vec<ModelMetadata>;
    fn schema_classes(&self) -> Vec<SchemaClass>;
}

/// HTTP methods a route can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl HttpMethod {
    /// Lowercase name, as used for path item keys
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }

    /// Methods whose validation rules describe a request body
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl TryFrom<&str> for HttpMethod {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            "options" => Ok(HttpMethod::Options),
            "head" => Ok(HttpMethod::Head),
            other => Err(format!("unsupported HTTP method `{}`", other)),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        HttpMethod::try_from(raw.as_str()).map_err(serde::de::Error::custom)
    }
}

/// One route of the application.
///
/// The URI is normalized on construction: a leading `/` is added and
/// `:name` placeholders become `{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub uri: String,
    pub methods: Vec<HttpMethod>,
    pub action: Option<String>,
    pub middlewares: Vec<String>,
    pub name: Option<String>,
}

impl RouteDescriptor {
    pub fn new(uri: &str, methods: Vec<HttpMethod>) -> Self {
        Self {
            uri: normalize_uri(uri),
            methods,
            action: None,
            middlewares: Vec::new(),
            name: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_middleware(mut self, middleware: impl Into<String>) -> Self {
        self.middlewares.push(middleware.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Add a leading `/` and turn `:name` segments into `{name}`
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();
    let converted: Vec<String> = trimmed
        .trim_start_matches('/')
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{}}}", name),
            _ => segment.to_string(),
        })
        .collect();
    format!("/{}", converted.join("/"))
}

/// Split an action into handler type and method.
///
/// `UserController@show` and `app::http::UserController::show` both give
/// `("UserController", "show")`. Anything else, closures included, gives `None`.
pub fn parse_action(action: &str) -> Option<(String, String)> {
    let action = action.trim();
    let (class, method) = match action.split_once('@') {
        Some(parts) => parts,
        None => action.rsplit_once("::")?,
    };
    let class = class.rsplit(|c: char| c == '\\' || c == ':').next().unwrap_or(class);
    if class.is_empty() || method.is_empty() || class == "Closure" {
        return None;
    }
    Some((class.to_string(), method.to_string()))
}

/// Everything known about a route handler
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HandlerMetadata {
    /// Handler type short name
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub method: String,
    /// Raw doc-comment
    #[serde(default)]
    pub doc: Option<String>,
    /// Dotted field path to rule spec
    #[serde(default)]
    pub rules: Map<String, Value>,
}

/// A data model and its persisted shape
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Persisted columns; `None` when the backing table does not exist
    #[serde(default)]
    pub columns: Option<Vec<ColumnMetadata>>,
    /// Columns never serialized
    #[serde(default)]
    pub hidden: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationMetadata>,
    /// Computed attributes appended on serialization
    #[serde(default)]
    pub appends: Vec<ComputedAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub length: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RelationMetadata {
    pub name: String,
    /// Related model; `None` when it cannot be resolved
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ComputedAttribute {
    pub name: String,
    /// Accessor computing the attribute; `None` when it is missing
    #[serde(default)]
    pub accessor: Option<AccessorMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccessorMetadata {
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub nullable: bool,
}

/// A custom schema class
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaClass {
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Class doc-comment, carrying `@Schema(...)`
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(default)]
    pub type_hint: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    /// Field doc-comment, carrying `@Property(...)`
    #[serde(default)]
    pub doc: Option<String>,
    /// Static value, used as the example
    #[serde(default)]
    pub value: Option<Value>,
}

/// Asks every resolver in turn.
///
/// The first match wins; later matches only fill in a missing doc-comment or
/// an empty rule set.
#[derive(Default)]
pub struct ChainedResolver<'a> {
    resolvers: Vec<&'a dyn HandlerResolver>,
}

impl<'a> ChainedResolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: &'a dyn HandlerResolver) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl HandlerResolver for ChainedResolver<'_> {
    fn resolve(&self, action: &str) -> Option<HandlerMetadata> {
        self.resolvers
            .iter()
            .filter_map(|r| r.resolve(action))
            .reduce(|mut merged, next| {
                if merged.doc.is_none() {
                    merged.doc = next.doc;
                }
                if merged.rules.is_empty() {
                    merged.rules = next.rules;
                }
                merged
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_uri() {
        assert_eq!(normalize_uri("api/users/{id}"), "/api/users/{id}");
        assert_eq!(normalize_uri("/api/users/:id/posts/:post"), "/api/users/{id}/posts/{post}");
        assert_eq!(normalize_uri("/"), "/");
        assert_eq!(normalize_uri(""), "/");
        assert_eq!(normalize_uri("/api/{slug?}"), "/api/{slug?}");
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(
            parse_action("UserController@show"),
            Some(("UserController".to_string(), "show".to_string()))
        );
        assert_eq!(
            parse_action("App\\Http\\Controllers\\UserController@show"),
            Some(("UserController".to_string(), "show".to_string()))
        );
        assert_eq!(
            parse_action("crate::handlers::UserHandler::index"),
            Some(("UserHandler".to_string(), "index".to_string()))
        );
        assert_eq!(parse_action("Closure"), None);
        assert_eq!(parse_action("health_check"), None);
    }

    #[test]
    fn test_http_method_conversions() {
        assert_eq!(HttpMethod::try_from("PATCH"), Ok(HttpMethod::Patch));
        assert!(HttpMethod::try_from("TRACE").is_err());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!(HttpMethod::Get.as_str(), "get");
        assert!(HttpMethod::Put.has_body());
        assert!(!HttpMethod::Delete.has_body());
    }

    #[test]
    fn test_route_builder() {
        let route = RouteDescriptor::new("users/:id", vec![HttpMethod::Get])
            .with_action("UserController@show")
            .with_middleware("auth:api")
            .with_name("users.show");
        assert_eq!(route.uri, "/users/{id}");
        assert_eq!(route.action.as_deref(), Some("UserController@show"));
        assert_eq!(route.middlewares, vec!["auth:api".to_string()]);
        assert_eq!(route.name.as_deref(), Some("users.show"));
    }

    #[test]
    fn test_chained_resolver_merges_matches() {
        struct Fixed(&'static str, HandlerMetadata);
        impl HandlerResolver for Fixed {
            fn resolve(&self, action: &str) -> Option<HandlerMetadata> {
                (action == self.0).then(|| self.1.clone())
            }
        }

        let mut rules = Map::new();
        rules.insert("name".to_string(), Value::from("required"));
        let with_rules = Fixed(
            "A@x",
            HandlerMetadata {
                class: "A".to_string(),
                rules,
                ..Default::default()
            },
        );
        let with_doc = Fixed(
            "A@x",
            HandlerMetadata {
                class: "Other".to_string(),
                doc: Some("/** Show */".to_string()),
                ..Default::default()
            },
        );
        let only_b = Fixed("B@y", HandlerMetadata::default());

        let chained = ChainedResolver::new().with(&with_rules).with(&with_doc).with(&only_b);
        let merged = chained.resolve("A@x").unwrap();
        assert_eq!(merged.class, "A");
        assert_eq!(merged.doc.as_deref(), Some("/** Show */"));
        assert_eq!(merged.rules.len(), 1);
        assert!(chained.resolve("B@y").is_some());
        assert!(chained.resolve("C@z").is_none());
    }
}
