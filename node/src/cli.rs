//! # CLI Interface
//!
//! Command-line structure for `ppo-node`, via `clap` derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ppo_contracts::Principal;

use crate::logging::LogFormat;

/// Product Protocol ledger operator.
///
/// Bootstraps a PPO deployment into a local snapshot, applies batches of
/// calls to it in strict order, and reports its state.
#[derive(Parser, Debug)]
#[command(
    name = "ppo-node",
    about = "Product Protocol ledger operator",
    version,
    propagate_version = true
)]
pub struct PpoNodeCli {
    /// Log output format.
    #[arg(long, global = true, env = "PPO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default deployment config.
    Init(InitArgs),
    /// Bootstrap the token and bucket from a config into a new snapshot.
    Deploy(DeployArgs),
    /// Apply a JSON batch of calls to a snapshot.
    Exec(ExecArgs),
    /// Print the read surface of a snapshot.
    Inspect(InspectArgs),
    /// Print Prometheus metrics for a snapshot.
    Metrics(StateArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the config.
    #[arg(long, short = 'o', default_value = "ppo.toml")]
    pub out: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct DeployArgs {
    /// Deployment config (TOML).
    #[arg(long, short = 'c', env = "PPO_CONFIG", default_value = "ppo.toml")]
    pub config: PathBuf,

    /// Snapshot to create.
    #[arg(long, short = 's', env = "PPO_STATE", default_value = "ppo-state.json")]
    pub state: PathBuf,

    /// Overwrite an existing snapshot.
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Snapshot to update.
    #[arg(long, short = 's', env = "PPO_STATE", default_value = "ppo-state.json")]
    pub state: PathBuf,

    /// JSON file holding an array of calls.
    pub batch: PathBuf,

    /// Stop at the first rejected call. Calls before it stay committed.
    #[arg(long)]
    pub fail_fast: bool,

    /// Apply the batch and print the outcome without saving.
    #[arg(long)]
    pub dry_run: bool,

    /// Write Prometheus metrics for the batch to this file
    /// (textfile-collector style).
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    #[arg(long, short = 's', env = "PPO_STATE", default_value = "ppo-state.json")]
    pub state: PathBuf,

    /// Also print this principal's balance and roles.
    #[arg(long)]
    pub account: Option<Principal>,

    /// Print token notifications from this sequence number on.
    #[arg(long)]
    pub events_since: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct StateArgs {
    #[arg(long, short = 's', env = "PPO_STATE", default_value = "ppo-state.json")]
    pub state: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        PpoNodeCli::command().debug_assert();
    }

    #[test]
    fn parses_account_principal() {
        let account = Principal::derive("alice");
        let cli = PpoNodeCli::try_parse_from([
            "ppo-node",
            "inspect",
            "--account",
            &account.to_hex(),
        ])
        .unwrap();
        match cli.command {
            Commands::Inspect(args) => assert_eq!(args.account, Some(account)),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
