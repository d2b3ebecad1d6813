//! Generation settings loaded from YAML or JSON.
//!
//! Every section falls back to its default when absent, so an empty file is a
//! valid configuration.
//!
//! # File format
//!
//! ```yaml
//! title: Pet Store API
//! version: 2.1.0
//! host: https://api.example.com
//! api_base_path: /api
//! servers:
//!   - https://api.example.com
//!   - url: https://staging.example.com
//!     description: Staging
//! default_tags_generation_strategy: controller
//! authentication_flow:
//!   OAuth2: authorizationCode
//! oauth_scopes:
//!   read: Read access
//! append:
//!   responses:
//!     401:
//!       description: (Unauthorized) Invalid or missing Access Token
//!   headers:
//!     X-Tenant:
//!       type: string
//!       example: acme
//! ignored:
//!   methods: [head, options]
//!   routes: [/docs]
//! schema_builders:
//!   P: paginate
//!   SP: simple_paginate
//! ```

use crate::document::Server;
use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Authentication definitions and the flows each one accepts
pub const ALLOWED_FLOWS: &[(&str, &[&str])] = &[
    (
        "OAuth2",
        &["password", "application", "implicit", "authorizationCode"],
    ),
    ("bearerAuth", &["http"]),
];

/// Generation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API title
    pub title: String,

    /// API description
    pub description: String,

    /// API version
    pub version: String,

    /// Public host; used for OAuth2 URLs and pagination links
    pub host: String,

    /// Prefix stripped from route URIs to build path keys
    pub api_base_path: String,

    /// Server list; plain URLs or `{url, description}` entries
    pub servers: Vec<ServerEntry>,

    /// Directory holding Rust sources with custom schema structs
    pub schemas: Option<PathBuf>,

    /// Tags declared at the document root
    pub tags: Vec<TagEntry>,

    /// How tags are derived for operations without explicit tags
    pub default_tags_generation_strategy: TagStrategy,

    /// Parse toggles
    pub parse: ParseSettings,

    /// Definition name (`OAuth2`, `bearerAuth`) to flow
    pub authentication_flow: BTreeMap<String, String>,

    /// OAuth2 scope name to description
    pub oauth_scopes: BTreeMap<String, String>,

    /// Middleware strings (`name:params`) that mark a route as secured
    pub security_middlewares: Vec<String>,

    /// Items appended to every operation
    pub append: AppendSettings,

    /// Items hidden from the document
    pub ignored: IgnoredSettings,

    /// Schema builder code to implementation name
    pub schema_builders: BTreeMap<String, String>,
}

/// A server as written in the configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerEntry {
    Url(String),
    Detailed {
        url: Option<String>,
        description: Option<String>,
    },
}

/// Root tag declaration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagEntry {
    pub name: String,
    pub description: Option<String>,
}

/// Tag derivation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagStrategy {
    /// First non-empty segment of the relative URI
    #[default]
    Prefix,
    /// Handler type name, words split, `Controller` removed
    Controller,
    /// Operations stay untagged
    None,
}

impl<'de> Deserialize<'de> for TagStrategy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_lowercase().as_str() {
            "prefix" => TagStrategy::Prefix,
            "controller" => TagStrategy::Controller,
            _ => TagStrategy::None,
        })
    }
}

/// Parse toggles
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParseSettings {
    /// Read handler doc-comments
    #[serde(alias = "docBlock")]
    pub doc_block: bool,
    /// Emit security schemes and per-route security
    pub security: bool,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            doc_block: true,
            security: true,
        }
    }
}

/// Items appended to every operation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppendSettings {
    /// Responses keyed by status code; existing codes are never replaced
    #[serde(deserialize_with = "string_keys")]
    pub responses: BTreeMap<String, AppendResponse>,
    /// Header parameters keyed by header name
    pub headers: BTreeMap<String, AppendHeader>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppendResponse {
    pub description: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendHeader {
    #[serde(rename = "type", default = "default_header_type")]
    pub header_type: String,
    #[serde(default)]
    pub example: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

fn default_header_type() -> String {
    "string".to_string()
}

/// Items hidden from the document
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IgnoredSettings {
    /// HTTP methods, compared case-insensitively
    pub methods: Vec<String>,
    /// Route names or URIs
    pub routes: Vec<String>,
    /// Model names; `*` hides every model
    pub models: Vec<String>,
}

impl Default for IgnoredSettings {
    fn default() -> Self {
        Self {
            methods: vec!["head".to_string(), "options".to_string()],
            routes: Vec::new(),
            models: Vec::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut authentication_flow = BTreeMap::new();
        authentication_flow.insert("bearerAuth".to_string(), "http".to_string());

        let mut responses = BTreeMap::new();
        responses.insert(
            "401".to_string(),
            AppendResponse {
                description: Some("(Unauthorized) Invalid or missing Access Token".to_string()),
                reference: None,
            },
        );

        let mut schema_builders = BTreeMap::new();
        schema_builders.insert("P".to_string(), "paginate".to_string());
        schema_builders.insert("SP".to_string(), "simple_paginate".to_string());

        Self {
            title: "Application API Documentation".to_string(),
            description: "Documentation for the Application API".to_string(),
            version: "1.0.0".to_string(),
            host: String::new(),
            api_base_path: "/api".to_string(),
            servers: Vec::new(),
            schemas: None,
            tags: Vec::new(),
            default_tags_generation_strategy: TagStrategy::Prefix,
            parse: ParseSettings::default(),
            authentication_flow,
            oauth_scopes: BTreeMap::new(),
            security_middlewares: vec!["auth:api".to_string(), "auth:sanctum".to_string()],
            append: AppendSettings {
                responses,
                headers: BTreeMap::new(),
            },
            ignored: IgnoredSettings::default(),
            schema_builders,
        }
    }
}

impl Settings {
    /// Load settings from a YAML or JSON file and validate them.
    ///
    /// Files ending in `.json` are read as JSON, everything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// authentication flows are invalid.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let settings: Self = if is_json {
            serde_json::from_str(&content)?
        } else if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content)?
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check every configured authentication flow against [`ALLOWED_FLOWS`].
    pub fn validate(&self) -> Result<()> {
        for (definition, flow) in &self.authentication_flow {
            let Some((_, flows)) = ALLOWED_FLOWS.iter().find(|(name, _)| name == definition) else {
                return Err(Error::InvalidDefinition {
                    definition: definition.clone(),
                    allowed: ALLOWED_FLOWS.iter().map(|(name, _)| name.to_string()).collect(),
                });
            };
            if !flows.contains(&flow.as_str()) {
                return Err(Error::InvalidAuthenticationFlow {
                    definition: definition.clone(),
                    flow: flow.clone(),
                    allowed: flows.iter().map(|f| f.to_string()).collect(),
                });
            }
        }
        Ok(())
    }

    /// Resolve the configured servers into document servers.
    ///
    /// Entries without a description get `"{title} Server #{n}"`. With no usable
    /// entry the host becomes the single `"{title} Main Server"`.
    pub fn document_servers(&self) -> Vec<Server> {
        let mut servers = Vec::new();

        for (index, entry) in self.servers.iter().enumerate() {
            let fallback = format!("{} Server #{}", self.title, index + 1);
            match entry {
                ServerEntry::Url(url) => servers.push(Server {
                    url: url.clone(),
                    description: Some(fallback),
                }),
                ServerEntry::Detailed { url: Some(url), description } if !url.is_empty() => {
                    servers.push(Server {
                        url: url.clone(),
                        description: Some(
                            description.clone().filter(|d| !d.is_empty()).unwrap_or(fallback),
                        ),
                    })
                }
                ServerEntry::Detailed { .. } => {}
            }
        }

        if servers.is_empty() && !self.host.is_empty() {
            servers.push(Server {
                url: self.host.clone(),
                description: Some(format!("{} Main Server", self.title)),
            });
        }

        servers
    }

    /// Whether the HTTP method is ignored
    pub fn is_ignored_method(&self, method: &str) -> bool {
        self.ignored
            .methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Map keys may be written as YAML integers (`401:`); read them as strings.
fn string_keys<'de, D, V>(deserializer: D) -> std::result::Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize, PartialEq, Eq, PartialOrd, Ord)]
    #[serde(untagged)]
    enum Key {
        Number(i64),
        Text(String),
    }

    let raw = BTreeMap::<Key, V>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let key = match key {
                Key::Number(n) => n.to_string(),
                Key::Text(s) => s,
            };
            (key, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_deserialize_defaults() {
        let settings: Settings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings.version, "1.0.0");
        assert_eq!(settings.api_base_path, "/api");
        assert_eq!(settings.default_tags_generation_strategy, TagStrategy::Prefix);
        assert!(settings.parse.doc_block);
        assert!(settings.parse.security);
        assert_eq!(settings.ignored.methods, vec!["head", "options"]);
        assert_eq!(settings.authentication_flow["bearerAuth"], "http");
        assert!(settings.append.responses.contains_key("401"));
        assert_eq!(settings.schema_builders["P"], "paginate");
    }

    #[test]
    fn test_deserialize_full() {
        let yaml = r#"
title: Pets
host: https://pets.test
servers:
  - https://a.test
  - url: https://b.test
    description: Bee
default_tags_generation_strategy: controller
parse:
  docBlock: false
authentication_flow:
  OAuth2: password
append:
  responses:
    500:
      description: Boom
      ref: Error
  headers:
    X-Tenant:
      example: acme
ignored:
  methods: [HEAD]
  models: ["*"]
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.title, "Pets");
        assert_eq!(settings.default_tags_generation_strategy, TagStrategy::Controller);
        assert!(!settings.parse.doc_block);
        assert!(settings.parse.security);
        assert_eq!(settings.append.responses["500"].reference.as_deref(), Some("Error"));
        assert_eq!(settings.append.headers["X-Tenant"].header_type, "string");
        assert!(settings.is_ignored_method("head"));
        assert!(!settings.is_ignored_method("get"));
        assert_eq!(settings.ignored.models, vec!["*"]);
    }

    #[test]
    fn test_unknown_strategy_means_none() {
        let settings: Settings =
            serde_yaml::from_str("default_tags_generation_strategy: whatever").unwrap();
        assert_eq!(settings.default_tags_generation_strategy, TagStrategy::None);
    }

    #[test]
    fn test_document_servers() {
        let settings: Settings = serde_yaml::from_str(
            "title: Pets\nservers:\n  - https://a.test\n  - url: https://b.test\n    description: Bee\n  - description: no url\n",
        )
        .unwrap();
        let servers = settings.document_servers();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].description.as_deref(), Some("Pets Server #1"));
        assert_eq!(servers[1].description.as_deref(), Some("Bee"));
    }

    #[test]
    fn test_document_servers_fall_back_to_host() {
        let settings: Settings = serde_yaml::from_str("title: Pets\nhost: https://pets.test").unwrap();
        let servers = settings.document_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].url, "https://pets.test");
        assert_eq!(servers[0].description.as_deref(), Some("Pets Main Server"));
    }

    #[test]
    fn test_validate_rejects_unknown_definition() {
        let settings: Settings = serde_yaml::from_str("authentication_flow:\n  ApiKey: header").unwrap();
        assert!(matches!(settings.validate(), Err(Error::InvalidDefinition { .. })));
    }

    #[test]
    fn test_validate_rejects_unknown_flow() {
        let settings: Settings = serde_yaml::from_str("authentication_flow:\n  bearerAuth: jwt").unwrap();
        match settings.validate() {
            Err(Error::InvalidAuthenticationFlow { definition, flow, allowed }) => {
                assert_eq!(definition, "bearerAuth");
                assert_eq!(flow, "jwt");
                assert_eq!(allowed, vec!["http".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_load_json_and_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("settings.json");
        fs::write(&json_path, r#"{"title": "From JSON"}"#).unwrap();
        assert_eq!(Settings::load(&json_path).unwrap().title, "From JSON");

        let yaml_path = temp_dir.path().join("settings.yaml");
        fs::write(&yaml_path, "title: From YAML\n").unwrap();
        assert_eq!(Settings::load(&yaml_path).unwrap().title, "From YAML");

        let empty_path = temp_dir.path().join("empty.yaml");
        fs::write(&empty_path, "").unwrap();
        assert_eq!(Settings::load(&empty_path).unwrap().version, "1.0.0");
    }

    #[test]
    fn test_load_rejects_invalid_flow() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.yaml");
        fs::write(&path, "authentication_flow:\n  OAuth2: magic\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
