//! Veritas offline verifier node — entry point.
//!
//! Starts the node with configuration from a TOML file or defaults.

mod api;
mod commands;
mod config;
mod node;
mod state;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::OfflineVerifierConfig;
use node::OfflineVerifierNode;

/// Veritas Offline Verifier Node
#[derive(Parser, Debug)]
#[command(name = "veritas-node", version, about = "Veritas offline verifier node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "veritas.toml")]
    config: PathBuf,

    /// Override the cache directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the organization backend URL.
    #[arg(long)]
    backend_url: Option<String>,

    /// Organization whose cache this node keeps.
    #[arg(long)]
    organization_id: Option<String>,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Never touch the network; verify from the cache only.
    #[arg(long)]
    offline: bool,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = OfflineVerifierConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(url) = args.backend_url {
        config.backend.url = url;
    }
    if let Some(org) = args.organization_id {
        config.sync.organization_id = Some(org);
    }
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.offline {
        config.network.offline = true;
    }

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Handle --init flag
    if args.init {
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote config");
        return Ok(());
    }

    tracing::info!("Veritas offline verifier v{}", env!("CARGO_PKG_VERSION"));

    let mut node = OfflineVerifierNode::new(config)?;
    node.start().await?;

    // Set up graceful shutdown on SIGINT
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "node event loop error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("Veritas node exited cleanly");
    Ok(())
}
