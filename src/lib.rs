//! openapi-synth - OpenAPI 3.0 synthesis from an application's route table,
//! validation rules and data-model schema.
//!
//! Developers write nothing beyond optional documentation comments. Routes,
//! handler metadata and entities come in through the [`extractor`] traits; the
//! engine merges them into one cross-referenced [`document::OpenApiDocument`].
//!
//! # Architecture
//!
//! Leaf to root:
//!
//! 1. [`rules`] - splits validation rule specs into typed constraints
//! 2. [`type_mapper`] - native and column types to schema types and examples
//! 3. [`annotations`] and [`builders`] - doc-comment tags and `Code(Model)`
//!    schema builders
//! 4. [`schema_generator`] - component schemas for models and schema classes
//! 5. [`parameters`] - path, query and body generators
//! 6. [`path_params`] - positional renaming of path parameters
//! 7. [`openapi_builder`] - walks the routes and assembles the document
//!
//! Around the core: [`config`] loads settings, [`scanner`], [`parser`] and
//! [`type_resolver`] feed the Rust source introspector, [`serializer`]
//! writes the result and [`cli`] ties everything together.
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_synth::{
//!     builders::SchemaBuilderRegistry,
//!     config::Settings,
//!     extractor::{manifest::AppManifest, EntityIntrospector},
//!     openapi_builder::OpenApiBuilder,
//!     schema_generator::SchemaRegistry,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let settings = Settings::load(Path::new("swagger.yaml")).unwrap();
//! let manifest = AppManifest::load(Path::new("app.yaml")).unwrap();
//!
//! let registry = SchemaRegistry::discover(&[&manifest as &dyn EntityIntrospector], &settings);
//! let builders = SchemaBuilderRegistry::from_settings(&settings).unwrap();
//! let document = OpenApiBuilder::new(&settings, &registry, &builders)
//!     .generate(&manifest, &manifest)
//!     .unwrap();
//!
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```

pub mod annotations;
pub mod builders;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod extractor;
pub mod openapi_builder;
pub mod parameters;
pub mod parser;
pub mod path_params;
pub mod rules;
pub mod scanner;
pub mod schema_generator;
pub mod security;
pub mod serializer;
pub mod type_mapper;
pub mod type_resolver;
