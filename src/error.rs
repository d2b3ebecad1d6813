/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types produced while synthesizing a document.
///
/// Every variant except [`Error::MultiplePathParams`] is fatal for a generation
/// pass. `MultiplePathParams` is returned by the path-param collector and the
/// orchestrator logs it and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A doc-comment tag body does not follow its grammar.
    #[error("failed to parse annotation: {message}\n{body}")]
    Annotation { body: String, message: String },

    /// Authentication flow configured under an unknown definition name.
    #[error("invalid definition `{definition}`, please select from the following: {}", allowed.join(", "))]
    InvalidDefinition {
        definition: String,
        allowed: Vec<String>,
    },

    /// Authentication flow value not allowed for its definition.
    #[error("invalid authentication flow `{flow}` for `{definition}`, please select one from the following: {}", allowed.join(", "))]
    InvalidAuthenticationFlow {
        definition: String,
        flow: String,
        allowed: Vec<String>,
    },

    /// A `Code(Model)` reference names a builder code that is not configured.
    #[error("schema builder `{code}` not found in `schema_builders` configuration; problem found trying to generate `{uri}`")]
    SchemaBuilderNotFound { code: String, uri: String },

    /// A configured builder code points at an implementation that does not exist.
    #[error("schema builder `{code}` refers to unknown implementation `{implementation}`")]
    UnknownSchemaBuilder { code: String, implementation: String },

    /// A rule spec whose shape cannot be split into constraints.
    #[error("rule `{field} => {rule}` is not well formatted")]
    MalformedRule { field: String, rule: String },

    /// A second, different `pathParams` change set for the same route.
    #[error("route `{uri}` has `pathParams` changes more than once; change path params in only one method and the changes will be applied to all methods of the route")]
    MultiplePathParams { uri: String },
}
