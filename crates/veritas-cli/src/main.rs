//! Veritas CLI — command-line client for a running offline verifier node.
//!
//! Subcommands: init, status, verify, verify-presentation, sync.

mod commands;

use clap::{Parser, Subcommand};

/// Veritas — offline credential verification.
#[derive(Parser, Debug)]
#[command(name = "veritas", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter node configuration.
    Init(commands::init::InitArgs),
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
    /// Verify a verifiable credential.
    Verify(commands::verify::VerifyArgs),
    /// Verify a verifiable presentation.
    VerifyPresentation(commands::verify_presentation::VerifyPresentationArgs),
    /// Sync the node's cache from the organization backend.
    Sync(commands::sync::SyncArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Verify(args) => commands::verify::run(args).await,
        Commands::VerifyPresentation(args) => commands::verify_presentation::run(args).await,
        Commands::Sync(args) => commands::sync::run(args).await,
    }
}
