//! `veritas init` — Write a starter node configuration file.

use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the config file.
    #[arg(short, long, default_value = "veritas.toml")]
    pub config: PathBuf,

    /// Organization backend URL.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub backend_url: String,

    /// Organization whose cache the node keeps.
    #[arg(long)]
    pub organization_id: Option<String>,

    /// Cache directory.
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Serialize)]
struct Backend<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct Storage<'a> {
    data_dir: &'a PathBuf,
}

#[derive(Serialize)]
struct Sync<'a> {
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<&'a str>,
}

#[derive(Serialize)]
struct StarterConfig<'a> {
    backend: Backend<'a>,
    storage: Storage<'a>,
    sync: Sync<'a>,
}

fn render(args: &InitArgs) -> anyhow::Result<String> {
    let config = StarterConfig {
        backend: Backend {
            url: &args.backend_url,
        },
        storage: Storage {
            data_dir: &args.data_dir,
        },
        sync: Sync {
            enabled: args.organization_id.is_some(),
            organization_id: args.organization_id.as_deref(),
        },
    };
    Ok(toml::to_string_pretty(&config)?)
}

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    if args.config.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.config.display()
        );
    }
    if let Some(parent) = args.config.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&args.config, render(args)?)?;
    println!("Wrote {}", args.config.display());
    println!();
    println!("Start the node with:");
    println!("  veritas-node --config {}", args.config.display());
    Ok(())
}
