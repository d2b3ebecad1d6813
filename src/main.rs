//! openapi-synth - command-line tool that synthesizes an OpenAPI 3.0 document.
//!
//! # Usage
//!
//! ```bash
//! openapi-synth [OPTIONS] <MANIFEST>
//! ```
//!
//! # Examples
//!
//! Generate JSON documentation to stdout:
//! ```bash
//! openapi-synth app.yaml
//! ```
//!
//! Generate YAML with custom settings and annotated schema sources:
//! ```bash
//! openapi-synth app.yaml -c swagger.yaml -s ./src -f yaml -o docs/openapi.yaml
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! openapi-synth app.yaml -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_synth::cli;

fn main() -> Result<()> {
    // Parse first so the verbose flag can pick the log level
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-synth starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
