//! # luftujd — luftuj daemon
//!
//! Composition root that wires all adapters together and runs the HRU
//! controller.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository, Modbus, valve and MQTT adapters
//! - Construct application services, injecting adapters via port traits
//! - Start the resolver, synchronizer and discovery loops
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod serve;
mod tools;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::tools::RunScriptArgs;

#[derive(Debug, Parser)]
#[command(name = "luftujd", version, about = "Heat recovery unit controller")]
struct Cli {
    /// Configuration file; missing is fine.
    #[arg(long, short, default_value = "luftuj.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the controller until interrupted (default).
    Serve,
    /// Execute a JSON command script against the unit and print its
    /// variables.
    RunScript(RunScriptArgs),
    /// Store the modes and events of a JSON timeline file.
    ImportTimeline {
        /// File holding `{ "modes": [...], "events": [...] }`.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve::run(config).await,
        Command::RunScript(args) => tools::run_script(&config, args).await,
        Command::ImportTimeline { file } => tools::import_timeline(&config, &file).await,
    }
}
