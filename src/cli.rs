use crate::builders::SchemaBuilderRegistry;
use crate::config::Settings;
use crate::extractor::manifest::AppManifest;
use crate::extractor::source::SourceIntrospector;
use crate::extractor::{ChainedResolver, EntityIntrospector, HandlerResolver};
use crate::openapi_builder::OpenApiBuilder;
use crate::schema_generator::SchemaRegistry;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// OpenAPI synthesizer - generate an OpenAPI 3.0 document from an application
/// manifest, validation rules and annotated schema sources
#[derive(Parser, Debug)]
#[command(name = "openapi-synth")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Application manifest (routes, handlers, models) in YAML or JSON
    #[arg(value_name = "MANIFEST")]
    pub manifest_path: PathBuf,

    /// Settings file in YAML or JSON (defaults apply when omitted)
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Directory of Rust sources with annotated schema structs and handlers
    #[arg(short = 's', long = "sources", value_name = "DIR")]
    pub sources_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Only document routes under this prefix (overrides `api_base_path`)
    #[arg(long = "filter", value_name = "PREFIX")]
    pub filter: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.manifest_path.is_file() {
        anyhow::bail!("Manifest file does not exist: {}", args.manifest_path.display());
    }
    if let Some(config) = &args.config_path {
        if !config.is_file() {
            anyhow::bail!("Config file does not exist: {}", config.display());
        }
    }
    if let Some(sources) = &args.sources_path {
        if !sources.is_dir() {
            anyhow::bail!("Sources path is not a directory: {}", sources.display());
        }
    }

    info!("Manifest: {}", args.manifest_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Run the main workflow and return the serialized document
pub fn generate(args: &CliArgs) -> Result<String> {
    let settings = match &args.config_path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    let manifest = AppManifest::load(&args.manifest_path)
        .with_context(|| format!("Failed to load manifest {}", args.manifest_path.display()))?;

    let mut sources = Vec::new();
    for dir in settings.schemas.iter().chain(args.sources_path.iter()) {
        info!("Scanning schema sources in {}", dir.display());
        sources.push(SourceIntrospector::from_dir(dir)?);
    }

    let mut introspectors: Vec<&dyn EntityIntrospector> = vec![&manifest];
    introspectors.extend(sources.iter().map(|s| s as &dyn EntityIntrospector));

    let registry = SchemaRegistry::discover(&introspectors, &settings);
    let builders = SchemaBuilderRegistry::from_settings(&settings)?;
    let resolver = sources
        .iter()
        .fold(ChainedResolver::new().with(&manifest), |chain, source| {
            chain.with(source as &dyn HandlerResolver)
        });

    let mut builder = OpenApiBuilder::new(&settings, &registry, &builders);
    if let Some(filter) = &args.filter {
        builder = builder.with_filter(filter.clone());
    }
    let document = builder
        .generate(&manifest, &resolver)
        .context("Failed to generate OpenAPI document")?;

    info!("Serializing to {:?} format...", args.output_format);
    match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document),
        OutputFormat::Json => serialize_json(&document),
    }
}

/// Run the main workflow: generate, then write to a file or stdout
pub fn run(args: CliArgs) -> Result<()> {
    let content = generate(&args)?;

    if let Some(output_path) = &args.output_path {
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    Ok(())
}
