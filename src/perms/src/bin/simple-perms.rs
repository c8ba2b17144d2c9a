//! Simple Perms host binary
//!
//! Wires the permission engine into a long-running host: loads the data
//! directory (fatal on failure), runs autosave, and saves on shutdown.
//! Also offers read-only inspection of a data directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simple_perms::{PermissionFacade, PermsConfig, Principal};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use uuid::Uuid;

/// Simple Perms CLI
#[derive(Parser)]
#[command(name = "simple-perms")]
#[command(about = "Group-based permission engine host")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SIMPLE_PERMS_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides config)
    #[arg(long, env = "SIMPLE_PERMS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Load the data directory and keep it saved until Ctrl+C
    Run,

    /// Print the decision the groups make for a principal
    Check {
        /// Principal UUID
        id: Uuid,

        /// Permission node
        node: String,

        /// Privilege tier used when the principal is unassigned
        #[arg(long, default_value_t = 0)]
        tier: u32,
    },

    /// Print a stored group and every permission along its chain
    Inspect {
        /// Group name
        group: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PermsConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => PermsConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    let log_level = if cli.verbose { "debug".to_string() } else { config.log_level.clone() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(true)
        .init();

    let perms = PermissionFacade::builder(config)
        .open()
        .await
        .context("Failed to initialize permission data")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(perms).await,
        Command::Check { id, node, tier } => {
            let principal = Principal::new(id).with_tier(tier);
            let group = perms.group_of(&principal);
            let result = perms.has_permission(&principal, &node);
            println!("{} [{}] {}: {}", id, group, node, result);
            Ok(())
        }
        Command::Inspect { group } => {
            if !perms.has_group(&group) {
                anyhow::bail!("Unknown group: {}", group);
            }
            let stored = perms.group(&group);
            println!("{}", serde_json::to_string_pretty(&*stored)?);
            for detail in perms.permission_details(&group) {
                let marker = if detail.effective { "*" } else { " " };
                println!("{} {} = {} (from {})", marker, detail.node, detail.value, detail.group);
            }
            println!("members: {}", perms.reverse_lookup(&group).len());
            Ok(())
        }
    }
}

async fn run(perms: std::sync::Arc<PermissionFacade>) -> Result<()> {
    info!("Starting Simple Perms v{}", simple_perms::VERSION);
    let autosave = perms.spawn_autosave();

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal (Ctrl+C)");

    if let Some(handle) = autosave {
        handle.stop();
    }
    perms.shutdown().await;

    info!("Stopped gracefully");
    Ok(())
}
