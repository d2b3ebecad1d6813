//! Introspection of Rust sources.
//!
//! Structs become custom schema classes: their doc-comments carry
//! `@Schema(...)` and `@Property(...)` tags, `Option<T>` fields are nullable,
//! `#[serde(rename)]` and `#[serde(skip)]` are honoured and generic structs are
//! treated as abstract. Methods in inherent `impl` blocks become handlers
//! whose doc-comment is reachable as `Type@method` or `path::Type::method`.

use super::{
    parse_action, EntityIntrospector, HandlerMetadata, HandlerResolver, ModelMetadata,
    SchemaClass, SchemaField,
};
use crate::parser::{AstParser, ParsedFile};
use crate::scanner::SourceScanner;
use crate::type_resolver::{doc_comment, field_type, parse_serde_attributes, type_to_string};
use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

/// Schema classes and handler docs read from a source tree
#[derive(Debug, Clone, Default)]
pub struct SourceIntrospector {
    schemas: Vec<SchemaClass>,
    handlers: BTreeMap<String, HandlerMetadata>,
}

impl SourceIntrospector {
    /// Scan and parse every Rust file under `root`.
    ///
    /// Files that fail to parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a readable directory.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let scan = SourceScanner::new(root.to_path_buf())
            .scan()
            .with_context(|| format!("Failed to scan sources in {}", root.display()))?;
        let parsed = AstParser::parse_all(&scan.rust_files);
        Ok(Self::from_files(&parsed))
    }

    pub fn from_files(files: &[ParsedFile]) -> Self {
        let mut introspector = Self::default();
        for file in files {
            introspector.visit_items(&file.syntax_tree.items);
        }
        debug!(
            "Source introspection found {} schema classes and {} handlers",
            introspector.schemas.len(),
            introspector.handlers.len()
        );
        introspector
    }

    fn visit_items(&mut self, items: &[syn::Item]) {
        for item in items {
            match item {
                syn::Item::Struct(item_struct) => self.schemas.push(schema_class(item_struct)),
                syn::Item::Impl(item_impl) if item_impl.trait_.is_none() => {
                    self.visit_impl(item_impl)
                }
                syn::Item::Mod(item_mod) => {
                    if let Some((_, nested)) = &item_mod.content {
                        self.visit_items(nested);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_impl(&mut self, item_impl: &syn::ItemImpl) {
        let self_ty = type_to_string(&item_impl.self_ty);
        let class = self_ty
            .split('<')
            .next()
            .and_then(|path| path.rsplit("::").next())
            .unwrap_or_default()
            .to_string();
        if class.is_empty() {
            return;
        }

        for impl_item in &item_impl.items {
            let syn::ImplItem::Fn(method) = impl_item else {
                continue;
            };
            let name = method.sig.ident.to_string();
            let key = format!("{}@{}", class, name);
            debug!("Found handler {}", key);
            self.handlers.insert(
                key,
                HandlerMetadata {
                    class: class.clone(),
                    method: name,
                    doc: doc_comment(&method.attrs),
                    rules: Default::default(),
                },
            );
        }
    }
}

fn schema_class(item: &syn::ItemStruct) -> SchemaClass {
    let fields = match &item.fields {
        syn::Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|field| {
                let serde_attrs = parse_serde_attributes(&field.attrs);
                if serde_attrs.skip || serde_attrs.flatten {
                    return None;
                }
                let ident = field.ident.as_ref()?.to_string();
                let ty = field_type(&field.ty);
                Some(SchemaField {
                    name: serde_attrs.rename.unwrap_or(ident),
                    type_hint: Some(ty.hint),
                    nullable: ty.nullable,
                    doc: doc_comment(&field.attrs),
                    value: None,
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    SchemaClass {
        name: item.ident.to_string(),
        is_abstract: !item.generics.params.is_empty(),
        doc: doc_comment(&item.attrs),
        fields,
    }
}

impl HandlerResolver for SourceIntrospector {
    fn resolve(&self, action: &str) -> Option<HandlerMetadata> {
        let (class, method) = parse_action(action)?;
        self.handlers.get(&format!("{}@{}", class, method)).cloned()
    }
}

impl EntityIntrospector for SourceIntrospector {
    fn models(&self) -> Vec<ModelMetadata> {
        Vec::new()
    }

    fn schema_classes(&self) -> Vec<SchemaClass> {
        self.schemas.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const SOURCE: &str = r#"
/// A pet in the store
///
/// @Schema(required: [name])
pub struct Pet {
    /// The pet name
    ///
    /// @Property(example: Rex)
    pub name: String,
    pub tag: Option<String>,
    #[serde(rename = "ownerId")]
    pub owner_id: u64,
    #[serde(skip)]
    pub secret: String,
}

pub struct Page<T> {
    pub items: Vec<T>,
}

pub struct PetController;

impl PetController {
    /// List pets
    ///
    /// @Response(code: 200, ref: Pet[])
    pub fn index(&self) {}
}

impl Default for PetController {
    /// Not a handler
    fn default() -> Self { PetController }
}

mod nested {
    pub struct Owner { pub name: String }
}
"#;

    fn introspect(source: &str) -> SourceIntrospector {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("pets.rs"), source).unwrap();
        SourceIntrospector::from_dir(temp_dir.path()).unwrap()
    }

    #[test]
    fn test_structs_become_schema_classes() {
        let introspector = introspect(SOURCE);
        let schemas = introspector.schema_classes();
        let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Pet", "Page", "PetController", "Owner"]);

        let pet = &schemas[0];
        assert!(!pet.is_abstract);
        assert!(pet.doc.as_deref().unwrap().contains("@Schema(required: [name])"));

        let fields: Vec<(&str, Option<&str>, bool)> = pet
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.type_hint.as_deref(), f.nullable))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("name", Some("String"), false),
                ("tag", Some("String"), true),
                ("ownerId", Some("u64"), false),
            ]
        );
        assert!(pet.fields[0].doc.as_deref().unwrap().contains("@Property(example: Rex)"));

        assert!(schemas[1].is_abstract);
    }

    #[test]
    fn test_inherent_methods_become_handlers() {
        let introspector = introspect(SOURCE);

        let handler = introspector.resolve("PetController@index").unwrap();
        assert_eq!(handler.class, "PetController");
        assert_eq!(handler.method, "index");
        assert!(handler.doc.unwrap().contains("List pets"));

        assert!(introspector.resolve("crate::http::PetController::index").is_some());
        assert!(introspector.resolve("PetController@default").is_none());
    }

    #[test]
    fn test_broken_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("good.rs"), "pub struct Tag { pub label: String }").unwrap();
        fs::write(temp_dir.path().join("bad.rs"), "pub struct {").unwrap();

        let introspector = SourceIntrospector::from_dir(temp_dir.path()).unwrap();
        assert_eq!(introspector.schema_classes().len(), 1);
        assert!(introspector.models().is_empty());
    }
}
