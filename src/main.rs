//! # docval CLI
//!
//! The `docval` binary validates a project's documentation from the
//! command line or serves the validation tools over MCP.
//!
//! ## Usage
//!
//! ```bash
//! docval --config ./config/docval.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docval validate <path>` | Run the validators and print the report |
//! | `docval check <path>` | Report whether documentation exists |
//! | `docval serve mcp` | Serve `validate_docs` and `check_docs` over stdio |
//!
//! ## Examples
//!
//! ```bash
//! # Only freshness and coverage, warnings and errors only
//! docval validate . --validators freshness,coverage --verbosity normal
//!
//! # Machine-readable report, checking external links
//! docval validate ../webapp --check-external-links --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docval::config;
use docval::engine::{Engine, ValidationOptions, Verbosity};
use docval::{logging, report, server};

/// docval: documentation validation for software projects.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Built-in defaults are used when the file does not exist.
#[derive(Parser)]
#[command(
    name = "docval",
    about = "docval: freshness, consistency, best-practice, coverage and code-style checks for project documentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docval.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project's documentation.
    ///
    /// Exits with status 1 when any validator fails.
    Validate {
        /// Project root directory.
        path: PathBuf,

        /// Validators to run, comma separated (default: all).
        #[arg(long, value_delimiter = ',')]
        validators: Vec<String>,

        /// Minimum coverage percentage for the coverage validator.
        #[arg(long)]
        min_coverage: Option<f64>,

        /// How much per-document detail to print.
        #[arg(long, value_enum, default_value = "detailed")]
        verbosity: Verbosity,

        /// Check external links over the network.
        #[arg(long)]
        check_external_links: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether a project has documentation.
    Check {
        /// Project root directory.
        path: PathBuf,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start a protocol server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Serve the validation tools over MCP on stdin/stdout.
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();

    let cfg = config::load_config_or_default(&cli.config)?;
    let engine = Arc::new(Engine::new(Arc::new(cfg)));

    match cli.command {
        Commands::Validate {
            path,
            validators,
            min_coverage,
            verbosity,
            check_external_links,
            json,
        } => {
            let options = ValidationOptions {
                validators: (!validators.is_empty()).then_some(validators),
                verbosity,
                skip_external_links: check_external_links.then_some(false),
                min_coverage,
            };
            if !report::run_validate(&engine, &path, options, json).await? {
                std::process::exit(1);
            }
        }
        Commands::Check { path, json } => {
            report::run_check(&engine, &path, json)?;
        }
        Commands::Serve { service } => match service {
            ServeService::Mcp => {
                server::run_stdio(engine).await?;
            }
        },
    }

    Ok(())
}
