use crate::annotations::{DocBlock, SchemaRefResolver};
use crate::builders::SchemaBuilderRegistry;
use crate::config::{AppendHeader, AppendResponse, Settings, TagStrategy};
use crate::document::{
    Components, Info, OpenApiDocument, Operation, Parameter, ParameterLocation, Response,
    Schema, Tag,
};
use crate::error::{Error, Result};
use crate::extractor::{HandlerMetadata, HandlerResolver, HttpMethod, RouteDescriptor, RouteTable};
use crate::parameters::{rules_generator, ParameterFragment, ParametersGenerator, PathParametersGenerator};
use crate::path_params::{PathParamChanges, PathParamOverride};
use crate::schema_generator::SchemaRegistry;
use crate::security::{route_security, security_schemes};
use log::{debug, info, warn};
use serde_json::Value;

/// OpenAPI document builder - walks the route table and merges everything
/// known about each route into one document
pub struct OpenApiBuilder<'a> {
    /// Generation settings
    settings: &'a Settings,
    /// Component schemas and `$ref` lookups
    registry: &'a SchemaRegistry,
    /// Builders for `Code(Model)` references
    builders: &'a SchemaBuilderRegistry,
    /// Route prefix overriding `api_base_path`
    filter: Option<String>,
}

/// Operation parts taken from a handler doc-comment
#[derive(Debug, Default)]
struct DocumentedOperation {
    operation: Operation,
    path_params: Option<Vec<PathParamOverride>>,
}

impl<'a> OpenApiBuilder<'a> {
    pub fn new(
        settings: &'a Settings,
        registry: &'a SchemaRegistry,
        builders: &'a SchemaBuilderRegistry,
    ) -> Self {
        debug!("Initializing OpenAPI builder");
        Self {
            settings,
            registry,
            builders,
            filter: None,
        }
    }

    /// Only document routes under this prefix and strip it from path keys
    pub fn with_filter(mut self, prefix: impl Into<String>) -> Self {
        self.filter = Some(prefix.into());
        self
    }

    /// Route prefix in effect, trailing `/` removed
    fn route_filter(&self) -> &str {
        self.filter
            .as_deref()
            .unwrap_or(&self.settings.api_base_path)
            .trim_end_matches('/')
    }

    /// Build the document.
    ///
    /// # Errors
    ///
    /// Fails on the first fatal problem: a malformed annotation or rule, or
    /// an unknown schema builder code. No partial document is returned.
    pub fn generate(
        &self,
        routes: &dyn RouteTable,
        resolver: &dyn HandlerResolver,
    ) -> Result<OpenApiDocument> {
        let mut document = self.base_document()?;
        let mut changes = PathParamChanges::new();

        let routes = routes.routes();
        info!("Documenting {} routes", routes.len());

        for route in &routes {
            if self.is_filtered(route) {
                debug!("Skipping filtered route {}", route.uri);
                continue;
            }

            let relative = self.relative_uri(&route.uri);
            let path_key = relative.replace("?}", "}");
            let prefix_tag = prefix_tag(&relative);

            let handler = route.action.as_deref().and_then(|a| resolver.resolve(a));
            let mut item = document.paths.remove(&path_key).unwrap_or_default();

            for method in &route.methods {
                if self.settings.is_ignored_method(method.as_str()) {
                    continue;
                }
                debug!("Documenting {} {}", method, path_key);

                let operation = self.operation(
                    route,
                    *method,
                    &path_key,
                    prefix_tag.as_deref(),
                    handler.as_ref(),
                    &mut changes,
                )?;
                item.operations.insert(method.as_str().to_string(), operation);
            }

            document.paths.insert(path_key, item);
        }

        changes.apply(&mut document);

        info!("Documented {} paths", document.paths.len());
        Ok(document)
    }

    fn base_document(&self) -> Result<OpenApiDocument> {
        let settings = self.settings;
        let mut components = Components {
            schemas: self.registry.generate(self.builders)?,
            ..Default::default()
        };
        if settings.parse.security {
            components.security_schemes = security_schemes(settings);
        }

        Ok(OpenApiDocument {
            openapi: "3.0.0".to_string(),
            info: Info {
                title: settings.title.clone(),
                description: Some(settings.description.clone()).filter(|d| !d.is_empty()),
                version: settings.version.clone(),
            },
            servers: settings.document_servers(),
            tags: settings
                .tags
                .iter()
                .map(|t| Tag {
                    name: t.name.clone(),
                    description: t.description.clone(),
                })
                .collect(),
            paths: Default::default(),
            components,
        })
    }

    /// Ignored by name or URI, or outside the route prefix. The prefix only
    /// matches whole segments, so `/api` keeps `/api/pets` but not `/apiary`.
    fn is_filtered(&self, route: &RouteDescriptor) -> bool {
        let ignored = &self.settings.ignored.routes;
        if let Some(name) = &route.name {
            if ignored.contains(name) {
                return true;
            }
        }
        if ignored.contains(&route.uri) {
            return true;
        }

        let filter = self.route_filter();
        !filter.is_empty() && !under_prefix(&route.uri, filter)
    }

    /// The URI with the route prefix removed
    fn relative_uri(&self, uri: &str) -> String {
        let relative = uri.strip_prefix(self.route_filter()).unwrap_or(uri);
        if relative.is_empty() {
            "/".to_string()
        } else {
            relative.to_string()
        }
    }

    fn operation(
        &self,
        route: &RouteDescriptor,
        method: HttpMethod,
        path_key: &str,
        prefix_tag: Option<&str>,
        handler: Option<&HandlerMetadata>,
        changes: &mut PathParamChanges,
    ) -> Result<Operation> {
        let DocumentedOperation {
            mut operation,
            path_params,
        } = self.documented_operation(handler, &route.uri)?;

        self.add_parameters(&mut operation, route, method, handler)?;
        self.add_append_items(&mut operation, &route.uri)?;

        if let Some(overrides) = path_params {
            if let Err(Error::MultiplePathParams { uri }) = changes.register(path_key, overrides) {
                warn!(
                    "Route {} has pathParams changes more than once; change path params in only one method and they apply to every method of the route (route: {})",
                    uri, route.uri
                );
            }
        }

        if self.settings.parse.security {
            operation.security = route_security(self.settings, &route.middlewares);
        }

        if operation.tags.is_empty() {
            let tag = match self.settings.default_tags_generation_strategy {
                TagStrategy::Prefix => prefix_tag.map(str::to_string),
                TagStrategy::Controller => handler.and_then(|h| controller_tag(&h.class)),
                TagStrategy::None => None,
            };
            operation.tags.extend(tag);
        }

        Ok(operation)
    }

    /// Summary, description, deprecation, `@Request` overlay and
    /// `@Response` entries of the handler doc-comment
    fn documented_operation(
        &self,
        handler: Option<&HandlerMetadata>,
        uri: &str,
    ) -> Result<DocumentedOperation> {
        let mut documented = DocumentedOperation::default();

        let Some(raw) = handler
            .and_then(|h| h.doc.as_deref())
            .filter(|d| !d.trim().is_empty())
        else {
            return Ok(documented);
        };
        if !self.settings.parse.doc_block {
            return Ok(documented);
        }

        let block = DocBlock::parse(raw);
        let operation = &mut documented.operation;
        operation.deprecated = block.has_tag("deprecated");
        operation.summary = block.summary.clone();
        operation.description = block.description.clone();

        if let Some(body) = block.first_tag("Request").and_then(|t| t.body.as_deref()) {
            for (key, value) in crate::annotations::parse_tag_body(body)? {
                match key.as_str() {
                    "operationId" => {
                        operation.operation_id = Some(value_text(&value));
                    }
                    "pathParams" => {
                        documented.path_params = Some(PathParamChanges::overrides_from_value(&value));
                    }
                    _ => operation.merge_value(&key, value)?,
                }
            }
        }

        let resolver = SchemaRefResolver::new(self.builders);
        for tag in block.tags_named("Response") {
            let Some(body) = tag.body.as_deref() else {
                continue;
            };

            let entries = crate::annotations::parse_tag_body(body)?;
            let Some(code) = entries.get("code").map(value_text) else {
                warn!("@Response without a code on {} is ignored", uri);
                continue;
            };

            let mut response = Response::new("");
            if let Some(description) = entries.get("description") {
                response.description = value_text(description);
            }
            if let Some(reference) = entries.get("ref") {
                response.set_json_schema(self.response_schema(&resolver, &value_text(reference), uri)?);
            }
            operation.responses.insert(code, response);
        }

        Ok(documented)
    }

    /// Builder and array references are resolved; a known entity becomes a
    /// component `$ref` and anything else is kept verbatim
    fn response_schema(
        &self,
        resolver: &SchemaRefResolver<'_>,
        reference: &str,
        uri: &str,
    ) -> Result<Schema> {
        if let Some(schema) = resolver.resolve_structured(reference, uri)? {
            return Ok(schema);
        }
        Ok(Schema {
            reference: Some(self.registry.schema_path(reference.trim())),
            ..Default::default()
        })
    }

    /// Path parameters from the route URI, then query parameters or a
    /// request body from the validation rules
    fn add_parameters(
        &self,
        operation: &mut Operation,
        route: &RouteDescriptor,
        method: HttpMethod,
        handler: Option<&HandlerMetadata>,
    ) -> Result<()> {
        let mut generated = match PathParametersGenerator::new(&route.uri).parameters()? {
            ParameterFragment::Parameters(parameters) => parameters,
            ParameterFragment::RequestBody(_) => Vec::new(),
        };

        let rules = handler.map(|h| &h.rules).filter(|r| !r.is_empty());
        if let Some(rules) = rules {
            match rules_generator(method, rules).parameters()? {
                ParameterFragment::Parameters(parameters) => generated.extend(parameters),
                ParameterFragment::RequestBody(body) => operation.request_body = Some(body),
            }
        }

        if !generated.is_empty() {
            let documented = std::mem::take(&mut operation.parameters);
            operation.parameters = generated;
            for parameter in documented {
                let duplicate = operation
                    .parameters
                    .iter()
                    .any(|p| p.name == parameter.name && p.location == parameter.location);
                if !duplicate {
                    operation.parameters.push(parameter);
                }
            }
        }
        Ok(())
    }

    /// Default response, configured append responses and global headers
    fn add_append_items(&self, operation: &mut Operation, uri: &str) -> Result<()> {
        if operation.responses.is_empty() {
            operation
                .responses
                .insert("200".to_string(), Response::new("OK"));
        }

        let resolver = SchemaRefResolver::new(self.builders);
        for (code, append) in &self.settings.append.responses {
            if operation.responses.contains_key(code) {
                continue;
            }
            let response = self.append_response(&resolver, append, uri)?;
            operation.responses.insert(code.clone(), response);
        }

        for (name, header) in &self.settings.append.headers {
            operation.parameters.push(header_parameter(name, header));
        }
        Ok(())
    }

    fn append_response(
        &self,
        resolver: &SchemaRefResolver<'_>,
        append: &AppendResponse,
        uri: &str,
    ) -> Result<Response> {
        let mut response = Response::new(append.description.clone().unwrap_or_default());
        if let Some(reference) = &append.reference {
            let schema = match resolver.resolve_structured(reference, uri)? {
                Some(schema) => schema,
                None => Schema::reference(reference.trim()),
            };
            response.set_json_schema(schema);
        }
        Ok(response)
    }
}

fn header_parameter(name: &str, header: &AppendHeader) -> Parameter {
    let mut schema = Schema::typed(&header.header_type);
    schema.default = header.example.clone();

    let mut parameter = Parameter::new(name, ParameterLocation::Header, schema);
    parameter.required = header.required;
    parameter.description = header.description.clone();
    if let Some(example) = &header.example {
        parameter.extensions.insert("example".to_string(), example.clone());
    }
    parameter
}

/// First non-empty segment of a relative URI
fn under_prefix(uri: &str, prefix: &str) -> bool {
    uri.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn prefix_tag(relative: &str) -> Option<String> {
    relative
        .split('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// `UserProfileController` becomes `User Profile`
fn controller_tag(class: &str) -> Option<String> {
    if class.is_empty() {
        return None;
    }

    let mut words = String::new();
    for c in class.chars() {
        if c.is_uppercase() && !words.is_empty() {
            words.push(' ');
        }
        words.push(c);
    }
    let tag = words.replace("Controller", "").trim().to_string();
    Some(tag).filter(|t| !t.is_empty())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
