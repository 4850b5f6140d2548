//! Binary entry point for kinship.
//!
//! This binary provides the maintenance CLI for family graph databases.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::Parser;
use kinship::cli::{Cli, CommandStatus, execute};
use kinship::config::KinshipConfig;
use kinship::observability;
use kinship::services::FamilyGraphService;
use kinship::storage::graph::SqliteGraphRepository;
use std::process::ExitCode;
use std::sync::Arc;

/// Exit code used when a relationship is rejected or a check answers no.
const EXIT_NEGATIVE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(&config.logging.clone().with_verbose(cli.verbose)) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(CommandStatus::Success) => ExitCode::SUCCESS,
        Ok(CommandStatus::Negative) => ExitCode::from(EXIT_NEGATIVE),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration, applying the `--database` override.
fn load_config(cli: &Cli) -> anyhow::Result<KinshipConfig> {
    let config = KinshipConfig::load(cli.config.as_deref()).context("reading configuration")?;
    Ok(match &cli.database {
        Some(path) => config.with_database_path(path.clone()),
        None => config,
    })
}

/// Opens the database and runs the selected command.
fn run_command(cli: Cli, config: &KinshipConfig) -> anyhow::Result<CommandStatus> {
    let repository = SqliteGraphRepository::new(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    let service = FamilyGraphService::new(Arc::new(repository));

    let mut out = std::io::stdout().lock();
    let status = execute(cli.command, &service, config.repair.sync_edges, &mut out)?;
    Ok(status)
}
