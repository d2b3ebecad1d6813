//! Application manifest: a YAML or JSON export of routes, handlers, models
//! and schema classes.
//!
//! ```yaml
//! routes:
//!   - uri: /api/users/{id}
//!     methods: [GET, HEAD]
//!     action: UserController@show
//!     middlewares: [api, "auth:api"]
//!     name: users.show
//! handlers:
//!   UserController@show:
//!     doc: |
//!       /**
//!        * Show a user
//!        */
//!     rules:
//!       include: string|in:posts,comments
//! models:
//!   - name: User
//!     columns:
//!       - { name: id, type: bigint }
//! schemas:
//!   - name: Pet
//!     fields:
//!       - { name: name, type_hint: string }
//! ```

use super::{
    normalize_uri, parse_action, EntityIntrospector, HandlerMetadata, HandlerResolver,
    HttpMethod, ModelMetadata, RouteDescriptor, RouteTable, SchemaClass,
};
use crate::error::Result;
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Explicitly registered application metadata
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppManifest {
    pub routes: Vec<RouteEntry>,
    /// Handler metadata keyed by action
    pub handlers: BTreeMap<String, HandlerMetadata>,
    pub models: Vec<ModelMetadata>,
    pub schemas: Vec<SchemaClass>,
}

/// A route as written in the manifest
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub uri: String,
    #[serde(alias = "method")]
    pub methods: Vec<HttpMethod>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, alias = "middleware")]
    pub middlewares: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl AppManifest {
    /// Load a manifest; `.json` files are read as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match the
    /// manifest format.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading application manifest from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let manifest: Self = if is_json {
            serde_json::from_str(&content)?
        } else if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content)?
        };

        debug!(
            "Manifest has {} routes, {} handlers, {} models, {} schemas",
            manifest.routes.len(),
            manifest.handlers.len(),
            manifest.models.len(),
            manifest.schemas.len()
        );
        Ok(manifest)
    }
}

impl RouteTable for AppManifest {
    fn routes(&self) -> Vec<RouteDescriptor> {
        self.routes
            .iter()
            .map(|entry| RouteDescriptor {
                uri: normalize_uri(&entry.uri),
                methods: entry.methods.clone(),
                action: entry.action.clone(),
                middlewares: entry.middlewares.clone(),
                name: entry.name.clone(),
            })
            .collect()
    }
}

impl HandlerResolver for AppManifest {
    /// Exact action match first, then `Class@method` of the parsed action
    fn resolve(&self, action: &str) -> Option<HandlerMetadata> {
        let (class, method) = parse_action(action)?;
        let short = format!("{}@{}", class, method);

        let mut metadata = self
            .handlers
            .get(action)
            .or_else(|| self.handlers.get(&short))
            .cloned()?;
        if metadata.class.is_empty() {
            metadata.class = class;
        }
        if metadata.method.is_empty() {
            metadata.method = method;
        }
        Some(metadata)
    }
}

impl EntityIntrospector for AppManifest {
    fn models(&self) -> Vec<ModelMetadata> {
        self.models.clone()
    }

    fn schema_classes(&self) -> Vec<SchemaClass> {
        self.schemas.clone()
    }
}
