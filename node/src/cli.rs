//! # CLI Interface
//!
//! Defines the command-line argument structure for `vault-node` using
//! `clap` derive. Supports three subcommands: `run`, `role-id` and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Local runner for the custody vault.
///
/// Deploys a fresh token and vault in memory, replays a scenario script
/// against them and prints a JSON report of the outcome.
#[derive(Parser, Debug)]
#[command(
    name = "vault-node",
    about = "Custody vault scenario runner",
    version,
    propagate_version = true
)]
pub struct VaultNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the vault node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario script against a freshly deployed vault.
    Run(RunArgs),
    /// Print the keccak256 role id for a role name.
    RoleId(RoleIdArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the scenario file (JSON).
    #[arg(long, short = 's', env = "VAULT_SCENARIO")]
    pub scenario: PathBuf,

    /// Log output format.
    #[arg(
        long,
        env = "VAULT_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(
        long,
        env = "VAULT_LOG_LEVEL",
        default_value = "vault_node=info,vault_contracts=info,vault_protocol=warn"
    )]
    pub log_level: String,

    /// Print only the summary, without per-step results.
    #[arg(long)]
    pub quiet: bool,
}

/// Arguments for the `role-id` subcommand.
#[derive(Parser, Debug)]
pub struct RoleIdArgs {
    /// Human-readable role name, e.g. `WITHDRAWER_ROLE`.
    pub name: String,
}
