//! Chainrun CLI - run and validate dependency-driven job graphs.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chainrun_core::config::ChainrunConfig;
use clap::{Parser, Subcommand};

use commands::{run, validate};
use output::OutputFormat;

/// Chainrun - dependency-driven job runner
#[derive(Parser)]
#[command(
    name = "chainrun",
    version,
    about = "Chainrun - dependency-driven job runner",
    long_about = "Runs a graph of shell commands, starting each job once the jobs it waits for have succeeded.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "CHAINRUN_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job file and print the report
    Run(run::RunArgs),

    /// Check a job file and print its execution waves
    Validate(validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = match &cli.config {
        Some(path) => ChainrunConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ChainrunConfig::load().context("failed to load configuration")?,
    };
    chainrun_core::observability::init(&config.logging);

    let format = cli.output;
    let result = match cli.command {
        Commands::Run(args) => run::execute(args, &config, format).await,
        Commands::Validate(args) => validate::execute(args, &config, format),
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}
