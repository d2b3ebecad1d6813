use crate::annotations::{comment_properties, SchemaRefResolver};
use crate::builders::SchemaBuilderRegistry;
use crate::config::Settings;
use crate::document::{schema_ref_path, Items, Schema, SCHEMA_REF_PREFIX};
use crate::error::{Error, Result};
use crate::extractor::{
    Cardinality, ComputedAttribute, EntityIntrospector, ModelMetadata, RelationMetadata,
    SchemaClass, SchemaField,
};
use crate::type_mapper::{
    coerce_example, example_for, is_native_type, map_column_type, map_native_type,
};
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema registry - turns data models and custom schema classes into
/// `components.schemas` entries
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Concrete, non-ignored models
    models: Vec<ModelMetadata>,
    /// Concrete custom schema classes
    schema_classes: Vec<SchemaClass>,
}

impl SchemaRegistry {
    /// Collect entities from every introspector.
    ///
    /// Abstract models and classes are dropped, as are models named in
    /// `ignored.models`. A `*` entry there drops every model.
    pub fn discover(introspectors: &[&dyn EntityIntrospector], settings: &Settings) -> Self {
        let ignored = &settings.ignored.models;
        let ignore_all = ignored.iter().any(|m| m == "*");

        let mut registry = Self::default();
        for introspector in introspectors {
            if !ignore_all {
                registry.models.extend(
                    introspector
                        .models()
                        .into_iter()
                        .filter(|m| !m.is_abstract && !ignored.contains(&m.name)),
                );
            }
            registry.schema_classes.extend(
                introspector
                    .schema_classes()
                    .into_iter()
                    .filter(|c| !c.is_abstract),
            );
        }

        debug!(
            "Discovered {} models and {} schema classes",
            registry.models.len(),
            registry.schema_classes.len()
        );
        registry
    }

    /// Names of every entity that gets a component schema
    pub fn defined_schemas(&self) -> Vec<&str> {
        self.models
            .iter()
            .filter(|m| m.columns.is_some())
            .map(|m| m.name.as_str())
            .chain(self.schema_classes.iter().map(|c| c.name.as_str()))
            .collect()
    }

    /// `#/components/schemas/Name` for a known entity, the input unchanged
    /// otherwise
    pub fn schema_path(&self, name: &str) -> String {
        if !name.starts_with(SCHEMA_REF_PREFIX) && self.defined_schemas().contains(&name) {
            return schema_ref_path(name);
        }
        name.to_string()
    }

    /// Generate one schema per entity.
    ///
    /// # Errors
    ///
    /// Fails when a custom schema annotation cannot be parsed or references
    /// an unknown schema builder. Model problems (missing table, relation or
    /// accessor) are logged and skipped.
    pub fn generate(&self, builders: &SchemaBuilderRegistry) -> Result<BTreeMap<String, Schema>> {
        let mut schemas = BTreeMap::new();

        for model in &self.models {
            if let Some(schema) = model_schema(model) {
                schemas.insert(model.name.clone(), schema);
            }
        }

        let resolver = SchemaRefResolver::new(builders);
        for class in &self.schema_classes {
            let schema = class_schema(class, &resolver)?;
            if schemas.insert(class.name.clone(), schema).is_some() {
                warn!("Custom schema {} replaces the model schema of the same name", class.name);
            }
        }

        debug!("Generated {} component schemas", schemas.len());
        Ok(schemas)
    }
}

fn model_schema(model: &ModelMetadata) -> Option<Schema> {
    let Some(columns) = &model.columns else {
        warn!("Model {} has no backing table, skipping", model.name);
        return None;
    };

    let mut schema = Schema::object();
    let properties = schema.properties.get_or_insert_with(BTreeMap::new);
    let mut required = Vec::new();

    for column in columns.iter().filter(|c| !model.hidden.contains(&c.name)) {
        let column_type = map_column_type(&column.column_type);

        let mut description = column.column_type.clone();
        if let (Some(length), "string") = (column.length, column_type.schema_type) {
            description.push_str(&format!("({})", length));
        }
        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            description.push_str(&format!(": {}", comment));
        }

        let mut property = Schema::typed(column_type.schema_type);
        property.format = column_type.format.map(str::to_string);
        property.description = Some(description);
        property.default = column.default.clone();
        property.nullable = Some(column.nullable);
        property.example = example_for(column_type.schema_type, column_type.format);

        if !column.nullable {
            required.push(column.name.clone());
        }
        properties.insert(column.name.clone(), property);
    }

    for relation in &model.relations {
        if let Some(property) = relation_schema(&model.name, relation) {
            properties.insert(relation.name.clone(), property);
        }
    }

    for attribute in &model.appends {
        if let Some((property, is_required)) = computed_schema(&model.name, attribute) {
            properties.insert(attribute.name.clone(), property);
            if is_required {
                required.push(attribute.name.clone());
            }
        }
    }

    if !required.is_empty() {
        schema.required = Some(required);
    }
    Some(schema)
}

fn relation_schema(model: &str, relation: &RelationMetadata) -> Option<Schema> {
    let Some(target) = &relation.target else {
        warn!(
            "Relation {}.{} has no resolvable target, skipping",
            model, relation.name
        );
        return None;
    };

    let reference = Schema::reference(short_name(target));
    Some(match relation.cardinality {
        Cardinality::One => reference,
        Cardinality::Many => Schema::array_of(reference),
    })
}

/// Schema of a computed attribute and whether it is required
fn computed_schema(model: &str, attribute: &ComputedAttribute) -> Option<(Schema, bool)> {
    let Some(accessor) = &attribute.accessor else {
        warn!(
            "Computed attribute {}.{} has no accessor, skipping",
            model, attribute.name
        );
        return None;
    };

    let Some(return_type) = accessor.return_type.as_deref().filter(|t| !t.is_empty()) else {
        return Some((Schema::default(), false));
    };

    let schema = if is_native_type(return_type) {
        let schema_type = map_native_type(return_type);
        let mut schema = Schema::typed(schema_type);
        schema.example = example_for(schema_type, None);
        schema
    } else {
        Schema::reference(short_name(return_type))
    };

    Some((schema, !accessor.nullable))
}

fn short_name(type_name: &str) -> &str {
    type_name
        .rsplit(|c: char| c == '\\' || c == ':')
        .next()
        .unwrap_or(type_name)
}

fn class_schema(class: &SchemaClass, resolver: &SchemaRefResolver<'_>) -> Result<Schema> {
    debug!("Generating custom schema {}", class.name);
    let class_props = comment_properties(class.doc.as_deref(), "Schema")?;

    let mut schema = Schema::object();
    let properties = schema.properties.get_or_insert_with(BTreeMap::new);
    for field in &class.fields {
        properties.insert(field.name.clone(), field_schema(&class.name, field, resolver)?);
    }

    if let Some(Value::Array(names)) = class_props.meta.get("required") {
        let required: Vec<String> = names
            .iter()
            .filter_map(Value::as_str)
            .filter(|name| properties.contains_key(*name))
            .map(str::to_string)
            .collect();
        if !required.is_empty() {
            schema.required = Some(required);
        }
    }

    Ok(schema)
}

fn field_schema(
    class: &str,
    field: &SchemaField,
    resolver: &SchemaRefResolver<'_>,
) -> Result<Schema> {
    let props = comment_properties(field.doc.as_deref(), "Property")?;
    let meta = &props.meta;

    if let Some(raw) = meta.get("raw") {
        return serde_json::from_value(raw.clone()).map_err(|e| Error::Annotation {
            body: raw.to_string(),
            message: format!("invalid raw schema for {}.{}: {}", class, field.name, e),
        });
    }

    let hint = field.type_hint.as_deref().unwrap_or("string");
    let mut schema = Schema::typed(map_native_type(hint));
    if schema.is_type("null") {
        schema.schema_type = Some("string".to_string());
    }
    if !props.summary.is_empty() {
        schema.description = Some(props.summary.clone());
    }
    schema.example = field.value.clone();
    if field.nullable {
        schema.nullable = Some(true);
    }

    if let Some(Value::String(schema_type)) = meta.get("type") {
        schema.schema_type = Some(schema_type.clone());
    }
    if let Some(description) = meta.get("description") {
        schema.description = Some(value_text(description));
    }
    if let Some(example) = meta.get("example") {
        schema.example = Some(example.clone());
    }
    if let Some(Value::Bool(nullable)) = meta.get("nullable") {
        schema.nullable = Some(*nullable);
    }
    if let Some(Value::String(format)) = meta.get("format") {
        schema.format = Some(format.clone());
    }

    if schema.is_type("array") {
        let item_type = match meta.get("arrayOf") {
            Some(Value::String(item_type)) => item_type.clone(),
            _ => "string".to_string(),
        };
        if schema.example.is_none() {
            schema.example = example_for(&item_type, None).map(|e| Value::Array(vec![e]));
        }
        schema.items = Some(Items::Single(Box::new(Schema::typed(&item_type))));
    }

    if let Some(Value::String(reference)) = meta.get("ref") {
        match resolver.resolve_structured(reference, class)? {
            Some(built) if built.is_type("array") => {
                schema.schema_type = built.schema_type;
                schema.items = built.items;
                schema.example = None;
            }
            Some(built) => {
                schema.schema_type = built.schema_type;
                schema.properties = built.properties;
                schema.required = built.required;
                schema.example = None;
            }
            None => return Ok(Schema::reference(reference.trim())),
        }
    }

    add_example(&mut schema);
    Ok(schema)
}

/// Generate an example when none is given, coerce a given one to the type
fn add_example(schema: &mut Schema) {
    let Some(schema_type) = schema.schema_type.clone() else {
        return;
    };
    if matches!(schema_type.as_str(), "object") && schema.properties.is_some() {
        return;
    }
    schema.example = match schema.example.take() {
        Some(example) => Some(coerce_example(example, &schema_type)),
        None => example_for(&schema_type, schema.format.as_deref()),
    };
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{AccessorMetadata, ColumnMetadata};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixed {
        models: Vec<ModelMetadata>,
        classes: Vec<SchemaClass>,
    }

    impl EntityIntrospector for Fixed {
        fn models(&self) -> Vec<ModelMetadata> {
            self.models.clone()
        }

        fn schema_classes(&self) -> Vec<SchemaClass> {
            self.classes.clone()
        }
    }

    fn column(name: &str, column_type: &str, nullable: bool) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            column_type: column_type.to_string(),
            nullable,
            ..Default::default()
        }
    }

    fn user_model() -> ModelMetadata {
        let mut email = column("email", "string", false);
        email.length = Some(191);
        email.comment = Some("Login address".to_string());
        let mut active = column("active", "boolean", false);
        active.default = Some(json!(true));

        ModelMetadata {
            name: "User".to_string(),
            columns: Some(vec![
                column("id", "bigint", false),
                email,
                column("password", "string", false),
                column("bio", "text", true),
                active,
            ]),
            hidden: vec!["password".to_string()],
            relations: vec![
                RelationMetadata {
                    name: "posts".to_string(),
                    target: Some("App\\Models\\Post".to_string()),
                    cardinality: Cardinality::Many,
                },
                RelationMetadata {
                    name: "team".to_string(),
                    target: Some("Team".to_string()),
                    cardinality: Cardinality::One,
                },
                RelationMetadata {
                    name: "broken".to_string(),
                    target: None,
                    cardinality: Cardinality::One,
                },
            ],
            appends: vec![
                ComputedAttribute {
                    name: "avatar_url".to_string(),
                    accessor: Some(AccessorMetadata {
                        return_type: Some("string".to_string()),
                        nullable: false,
                    }),
                },
                ComputedAttribute {
                    name: "manager".to_string(),
                    accessor: Some(AccessorMetadata {
                        return_type: Some("App\\Models\\User".to_string()),
                        nullable: true,
                    }),
                },
                ComputedAttribute {
                    name: "meta".to_string(),
                    accessor: Some(AccessorMetadata::default()),
                },
                ComputedAttribute {
                    name: "missing".to_string(),
                    accessor: None,
                },
            ],
            ..Default::default()
        }
    }

    fn registry(models: Vec<ModelMetadata>, classes: Vec<SchemaClass>, settings: &Settings) -> SchemaRegistry {
        let fixed = Fixed { models, classes };
        SchemaRegistry::discover(&[&fixed as &dyn EntityIntrospector], settings)
    }

    #[test]
    fn test_model_schema() {
        let registry = registry(vec![user_model()], Vec::new(), &Settings::default());
        let schemas = registry.generate(&SchemaBuilderRegistry::new()).unwrap();
        let user = serde_json::to_value(&schemas["User"]).unwrap();

        assert_eq!(user["type"], json!("object"));
        assert_eq!(user["properties"]["id"]["format"], json!("int64"));
        assert_eq!(
            user["properties"]["email"]["description"],
            json!("string(191): Login address")
        );
        assert_eq!(user["properties"]["bio"]["nullable"], json!(true));
        assert_eq!(user["properties"]["active"]["default"], json!(true));
        assert!(user["properties"].get("password").is_none());

        assert_eq!(
            user["properties"]["posts"],
            json!({"type": "array", "items": {"$ref": "#/components/schemas/Post"}})
        );
        assert_eq!(user["properties"]["team"], json!({"$ref": "#/components/schemas/Team"}));
        assert!(user["properties"].get("broken").is_none());

        assert_eq!(user["properties"]["avatar_url"]["type"], json!("string"));
        assert_eq!(user["properties"]["manager"], json!({"$ref": "#/components/schemas/User"}));
        assert_eq!(user["properties"]["meta"], json!({}));
        assert!(user["properties"].get("missing").is_none());

        assert_eq!(user["required"], json!(["id", "email", "active", "avatar_url"]));
    }

    #[test]
    fn test_model_without_table_is_skipped() {
        let model = ModelMetadata {
            name: "Report".to_string(),
            ..Default::default()
        };
        let registry = registry(vec![model], Vec::new(), &Settings::default());
        assert!(registry.defined_schemas().is_empty());
        assert!(registry.generate(&SchemaBuilderRegistry::new()).unwrap().is_empty());
    }

    #[test]
    fn test_ignored_and_abstract_entities() {
        let mut settings = Settings::default();
        settings.ignored.models = vec!["User".to_string()];
        let base = ModelMetadata {
            name: "Base".to_string(),
            is_abstract: true,
            columns: Some(Vec::new()),
            ..Default::default()
        };
        let generic = SchemaClass {
            name: "Page".to_string(),
            is_abstract: true,
            ..Default::default()
        };
        let registry = registry(vec![user_model(), base], vec![generic], &settings);
        assert!(registry.defined_schemas().is_empty());

        settings.ignored.models = vec!["*".to_string()];
        let registry = self::registry(vec![user_model()], Vec::new(), &settings);
        assert!(registry.defined_schemas().is_empty());
    }

    #[test]
    fn test_schema_path() {
        let registry = registry(vec![user_model()], Vec::new(), &Settings::default());
        assert_eq!(registry.schema_path("User"), "#/components/schemas/User");
        assert_eq!(registry.schema_path("Unknown"), "Unknown");
        assert_eq!(
            registry.schema_path("#/components/schemas/Other"),
            "#/components/schemas/Other"
        );
    }

    fn pet_class() -> SchemaClass {
        let field = |name: &str, hint: Option<&str>, doc: Option<&str>| SchemaField {
            name: name.to_string(),
            type_hint: hint.map(str::to_string),
            doc: doc.map(str::to_string),
            ..Default::default()
        };

        let mut name = field("name", Some("string"), Some("/** The pet name */"));
        name.value = Some(json!("Rex"));
        let mut tag = field("tag", Some("String"), None);
        tag.nullable = true;

        SchemaClass {
            name: "Pet".to_string(),
            doc: Some("/** @Schema(required: [name, ghost]) */".to_string()),
            fields: vec![
                name,
                tag,
                field("age", Some("int"), Some("/** @Property(example: \"3\") */")),
                field("photos", Some("array"), Some("/** @Property(arrayOf: integer) */")),
                field(
                    "owner",
                    None,
                    Some("/** @Property(ref: Owner, description: ignored) */"),
                ),
                field("friends", None, Some("/** @Property(ref: Pet[]) */")),
                field("visits", None, Some("/** @Property(ref: SP(Visit)) */")),
                field(
                    "color",
                    None,
                    Some(r#"/** @Property(raw: {"type": "string", "enum": ["red", "black"]}) */"#),
                ),
                field("born", None, Some("/** @Property(type: string, format: date-time) */")),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_custom_schema_class() {
        let registry = registry(Vec::new(), vec![pet_class()], &Settings::default());
        let builders = SchemaBuilderRegistry::from_settings(&Settings::default()).unwrap();
        let schemas = registry.generate(&builders).unwrap();
        let pet = serde_json::to_value(&schemas["Pet"]).unwrap();
        let props = &pet["properties"];

        assert_eq!(pet["required"], json!(["name"]));
        assert_eq!(
            props["name"],
            json!({"type": "string", "description": "The pet name", "example": "Rex"})
        );
        assert_eq!(props["tag"]["nullable"], json!(true));
        assert_eq!(props["age"], json!({"type": "integer", "example": 3}));
        assert_eq!(props["photos"]["items"], json!({"type": "integer"}));
        assert_eq!(props["photos"]["example"], json!([1]));
        assert_eq!(props["owner"], json!({"$ref": "#/components/schemas/Owner"}));
        assert_eq!(
            props["friends"],
            json!({"type": "array", "items": {"$ref": "#/components/schemas/Pet"}})
        );
        assert_eq!(props["visits"]["type"], json!("object"));
        assert!(props["visits"]["properties"]["next_page_url"].is_object());
        assert_eq!(props["color"], json!({"type": "string", "enum": ["red", "black"]}));
        assert_eq!(props["born"]["format"], json!("date-time"));
        assert!(props["born"]["example"].is_string());
    }

    #[test]
    fn test_custom_schema_with_unknown_builder_fails() {
        let class = SchemaClass {
            name: "Feed".to_string(),
            fields: vec![SchemaField {
                name: "items".to_string(),
                doc: Some("/** @Property(ref: X(Post)) */".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = registry(Vec::new(), vec![class], &Settings::default());
        let result = registry.generate(&SchemaBuilderRegistry::new());
        assert!(matches!(result, Err(Error::SchemaBuilderNotFound { code, .. }) if code == "X"));
    }
}
