// Copyright (c) 2026 Product Protocol Developers. MIT License.
// See LICENSE for details.

//! # PPO Node
//!
//! Entry point for the `ppo-node` binary. Parses CLI arguments,
//! initializes logging and dispatches to one of:
//!
//! - `init`:    write a default deployment config
//! - `deploy`:  bootstrap token and bucket into a snapshot
//! - `exec`:    apply a batch of calls, in order, to a snapshot
//! - `inspect`: print the read surface of a snapshot
//! - `metrics`: print Prometheus metrics for a snapshot
//! - `version`: print build version information

mod cli;
mod config;
mod logging;
mod metrics;
mod ops;
mod store;

use anyhow::{bail, Context, Result};
use clap::Parser;

use cli::{Commands, PpoNodeCli};
use config::DeploymentConfig;
use metrics::NodeMetrics;
use ops::Call;
use store::Snapshot;

const DEFAULT_LOG_LEVEL: &str = "ppo_node=info,ppo_contracts=info";

fn main() -> Result<()> {
    let cli = PpoNodeCli::parse();
    logging::init_logging(DEFAULT_LOG_LEVEL, cli.log_format);

    match cli.command {
        Commands::Init(args) => init_config(args),
        Commands::Deploy(args) => deploy(args),
        Commands::Exec(args) => exec(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Metrics(args) => print_metrics(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn init_config(args: cli::InitArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", args.out.display());
    }
    let rendered = DeploymentConfig::default().to_toml()?;
    std::fs::write(&args.out, rendered)
        .with_context(|| format!("failed to write config: {}", args.out.display()))?;
    tracing::info!(path = %args.out.display(), "default config written");
    println!("Config written to {}", args.out.display());
    Ok(())
}

fn deploy(args: cli::DeployArgs) -> Result<()> {
    if args.state.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", args.state.display());
    }
    let config = DeploymentConfig::load(&args.config)?;
    let mut snapshot = Snapshot::deploy(&config)?;
    snapshot.save(&args.state)?;

    let system = &snapshot.system;
    println!("Deployment created.");
    println!("  Snapshot       : {}", args.state.display());
    println!("  Token          : {} ({})", system.token().name(), system.token().symbol());
    println!("  Cap            : {}", system.token().cap());
    println!("  Owner          : {}", config.deployer);
    println!("  Bucket         : {}", system.principal());
    println!("  Bucket size    : {}", system.size());
    println!("  Bucket rate    : {}/s", system.rate());
    Ok(())
}

fn exec(args: cli::ExecArgs) -> Result<()> {
    let mut snapshot = Snapshot::load(&args.state)?;
    let contents = std::fs::read_to_string(&args.batch)
        .with_context(|| format!("failed to read batch: {}", args.batch.display()))?;
    let calls: Vec<Call> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse batch: {}", args.batch.display()))?;

    let token_cursor = snapshot.system.token().events().next_sequence();
    let bucket_cursor = snapshot.system.events().next_sequence();

    let outcomes = ops::run_batch(&mut snapshot.system, &calls, args.fail_fast);
    let rejected = outcomes.iter().filter(|o| !o.is_ok()).count();
    tracing::info!(
        applied = outcomes.len() - rejected,
        rejected,
        skipped = calls.len() - outcomes.len(),
        "batch finished"
    );

    if args.dry_run {
        tracing::info!("dry run, snapshot left unchanged");
    } else {
        snapshot.save(&args.state)?;
    }

    if let Some(path) = &args.metrics_out {
        let metrics = NodeMetrics::new().context("failed to create metrics registry")?;
        metrics.record_outcomes(&outcomes);
        metrics.observe(&snapshot.system);
        std::fs::write(path, metrics.encode().context("failed to encode metrics")?)
            .with_context(|| format!("failed to write metrics: {}", path.display()))?;
    }

    let stdout = std::io::stdout();
    ops::write_batch_report(
        &mut stdout.lock(),
        &outcomes,
        snapshot.system.token().events().since(token_cursor),
        snapshot.system.events().since(bucket_cursor),
    )
    .context("failed to write batch report")?;
    Ok(())
}

fn inspect(args: cli::InspectArgs) -> Result<()> {
    let snapshot = Snapshot::load(&args.state)?;
    let system = &snapshot.system;
    let token = system.token();

    println!("Token");
    println!("  Name             : {}", token.name());
    println!("  Symbol           : {}", token.symbol());
    println!("  Decimals         : {}", token.decimals());
    println!("  Cap              : {}", token.cap());
    println!("  Total supply     : {}", token.total_supply());
    println!("  Minting finished : {}", token.minting_finished());
    println!("  Finalized        : {}", token.finalized());
    println!("  Owners           : {}", join(token.roles().owners()));
    println!("  Minters          : {}", join(token.roles().minters()));
    println!("Bucket");
    println!("  Principal        : {}", system.principal());
    println!("  Size             : {}", system.size());
    println!("  Rate             : {}/s", system.rate());
    println!("  Available        : {}", system.available());
    println!("  Owners           : {}", join(system.roles().owners()));
    println!("  Minters          : {}", join(system.roles().minters()));

    if let Some(account) = args.account {
        println!("Account {}", account);
        println!("  Balance          : {}", token.balance_of(&account));
        println!("  Token owner      : {}", token.is_owner(&account));
        println!("  Token minter     : {}", token.is_minter(&account));
        println!("  Bucket owner     : {}", system.is_owner(&account));
        println!("  Bucket minter    : {}", system.is_minter(&account));
    }

    if let Some(cursor) = args.events_since {
        for notification in token.events().since(cursor) {
            println!("{}", serde_json::to_string(notification)?);
        }
    }
    Ok(())
}

fn print_metrics(args: cli::StateArgs) -> Result<()> {
    let snapshot = Snapshot::load(&args.state)?;
    let metrics = NodeMetrics::new().context("failed to create metrics registry")?;
    metrics.observe(&snapshot.system);
    print!("{}", metrics.encode().context("failed to encode metrics")?);
    Ok(())
}

fn join<'a>(principals: impl Iterator<Item = &'a ppo_contracts::Principal>) -> String {
    let items: Vec<String> = principals.map(|p| p.to_string()).collect();
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn print_version() {
    println!("ppo-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}
