//! `veritas sync` — Ask the node to sync its cache from the backend.

use clap::Args;
use serde::{Deserialize, Serialize};

use super::{bail_on_error, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Organization to sync; defaults to the node's current organization.
    #[arg(short, long)]
    pub organization_id: Option<String>,

    /// Skip the cooldown, backoff and version checks.
    #[arg(long)]
    pub force: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<String>,
    force: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ItemsUpdated {
    #[serde(default)]
    public_keys: usize,
    #[serde(default)]
    contexts: usize,
    #[serde(default)]
    revoked_vcs: usize,
    #[serde(default)]
    status_lists: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncResponse {
    success: bool,
    #[serde(default)]
    items_updated: ItemsUpdated,
    #[serde(default)]
    skipped: bool,
    #[serde(default)]
    error: Option<String>,
}

pub async fn run(args: &SyncArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/sync", args.endpoint);
    let body = SyncRequest {
        organization_id: args.organization_id.clone(),
        force: args.force,
    };

    let client = reqwest::Client::new();
    let resp = match client.post(&url).json(&body).send().await {
        Ok(r) => r,
        Err(e) => {
            println!("Could not reach node at {}", args.endpoint);
            println!("  Error: {}", e);
            return Ok(());
        }
    };

    let result: SyncResponse = bail_on_error("sync", resp).await?.json().await?;
    if !result.success {
        anyhow::bail!(
            "sync failed: {}",
            result.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    if result.skipped {
        println!("Cache already up to date");
        return Ok(());
    }
    let items = result.items_updated;
    println!("Sync complete:");
    println!("  Public keys:   {}", items.public_keys);
    println!("  Contexts:      {}", items.contexts);
    println!("  Revoked VCs:   {}", items.revoked_vcs);
    println!("  Status lists:  {}", items.status_lists);
    Ok(())
}
