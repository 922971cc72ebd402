// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Node
//!
//! Entry point for the `vault-node` binary. Parses CLI arguments,
//! initializes logging, deploys an in-memory token and vault, and replays a
//! scenario script against them.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — replay a scenario and print a JSON report
//! - `role-id` — print the role id for a role name
//! - `version` — print build version information

mod cli;
mod logging;
mod scenario;

use anyhow::{bail, Result};
use clap::Parser;

use vault_contracts::RoleId;
use vault_protocol::config::{TOKEN_NAME, TOKEN_SYMBOL};

use cli::{Commands, VaultNodeCli};
use scenario::Scenario;

fn main() -> Result<()> {
    let cli = VaultNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::RoleId(args) => {
            println!("{}", RoleId::from_name(&args.name).to_hex());
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads the scenario, replays it and prints the report to stdout.
///
/// Exits with an error when any step's outcome differs from what the
/// script expected.
fn run_scenario(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format)?;

    tracing::info!(scenario = %args.scenario.display(), "starting vault-node");

    let scenario = Scenario::load(&args.scenario)?;
    let mut report = scenario::run(&scenario)?;
    let mismatches = report.mismatches;

    if args.quiet {
        report = report.summary_only();
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if mismatches > 0 {
        bail!("{mismatches} step(s) did not match their expected outcome");
    }
    tracing::info!(steps = scenario.steps.len(), "scenario completed");
    Ok(())
}

/// Prints version and build information to stdout.
fn print_version() {
    println!("vault-node {}", env!("CARGO_PKG_VERSION"));
    println!("token      {TOKEN_NAME} ({TOKEN_SYMBOL})");
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
