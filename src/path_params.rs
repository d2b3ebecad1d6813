//! Two-phase renaming and retyping of path parameters.
//!
//! A handler may declare `pathParams` in its `@Request` annotation: an ordered
//! list of `{name, type?, ...}` overrides matched to the route's placeholders
//! by position. Overrides are collected per route while operations are built
//! and applied once every route has been processed, because all methods of a
//! path share the rewritten template.

use crate::document::{OpenApiDocument, Parameter, ParameterLocation};
use crate::error::{Error, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A `{name}` or `{name?}` URI placeholder; group 1 is the raw name
pub(crate) static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]*)\}").expect("placeholder regex should be valid"));

/// One positional override
pub type PathParamOverride = Map<String, Value>;

/// Pending path parameter changes keyed by relative URI
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParamChanges {
    changes: BTreeMap<String, Vec<PathParamOverride>>,
}

impl PathParamChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `pathParams` value of an annotation.
    ///
    /// Entries that are not objects are dropped.
    pub fn overrides_from_value(value: &Value) -> Vec<PathParamOverride> {
        match value {
            Value::Array(entries) => entries
                .iter()
                .filter_map(|entry| entry.as_object().cloned())
                .collect(),
            Value::Object(single) => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    /// Record the overrides for a URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultiplePathParams`] when the URI already has a
    /// different change set; the first one is kept.
    pub fn register(&mut self, uri: &str, overrides: Vec<PathParamOverride>) -> Result<()> {
        match self.changes.get(uri) {
            Some(existing) if *existing == overrides => Ok(()),
            Some(_) => Err(Error::MultiplePathParams {
                uri: uri.to_string(),
            }),
            None => {
                debug!("Registered {} path param overrides for {}", overrides.len(), uri);
                self.changes.insert(uri.to_string(), overrides);
                Ok(())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Rewrite every recorded path in the document.
    ///
    /// Templates are rewritten positionally, path parameters of every
    /// operation are renamed and retyped by position, and the path item moves
    /// to its new key. When that key is already documented the operations are
    /// merged and the existing operation wins for a method both define.
    pub fn apply(&self, document: &mut OpenApiDocument) {
        for (uri, overrides) in &self.changes {
            let Some(mut item) = document.paths.remove(uri) else {
                continue;
            };

            for operation in item.operations.values_mut() {
                rewrite_parameters(&mut operation.parameters, overrides);
            }

            let renamed = replace_placeholders(uri, overrides);
            debug!("Renamed path {} to {}", uri, renamed);
            let target = document.paths.entry(renamed.clone()).or_default();
            for (method, operation) in item.operations {
                if target.operations.contains_key(&method) {
                    warn!(
                        "{} {} is already documented; dropping the renamed {} operation",
                        method.to_uppercase(),
                        renamed,
                        uri
                    );
                    continue;
                }
                target.operations.insert(method, operation);
            }
        }
    }
}

/// Replace the Nth `{...}` token with the Nth override name. Tokens without
/// a matching named override are left alone.
pub fn replace_placeholders(uri: &str, overrides: &[PathParamOverride]) -> String {
    let mut index = 0;
    PLACEHOLDER
        .replace_all(uri, |captures: &regex::Captures| {
            let name = overrides
                .get(index)
                .and_then(|o| o.get("name"))
                .and_then(Value::as_str);
            index += 1;
            match name {
                Some(name) => format!("{{{}}}", name),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

fn rewrite_parameters(parameters: &mut [Parameter], overrides: &[PathParamOverride]) {
    let path_parameters = parameters
        .iter_mut()
        .filter(|p| p.location == ParameterLocation::Path);

    for (parameter, change) in path_parameters.zip(overrides) {
        let mut change = change.clone();
        if let Some(Value::String(schema_type)) = change.remove("type") {
            parameter.schema.schema_type = Some(schema_type);
        }
        if let Some(Value::String(name)) = change.remove("name") {
            parameter.name = name;
        }
        if let Some(Value::Bool(required)) = change.remove("required") {
            parameter.required = required;
        }
        if let Some(Value::String(description)) = change.remove("description") {
            parameter.description = Some(description);
        }
        change.remove("in");
        parameter.extensions.extend(change);
    }
}
