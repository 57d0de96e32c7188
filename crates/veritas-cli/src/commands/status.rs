//! `veritas status` — Query the status of a running node.

use clap::Args;
use serde::Deserialize;

use super::DEFAULT_ENDPOINT;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also show sync bookkeeping for the current organization.
    #[arg(long)]
    pub sync: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct CacheCounts {
    public_keys: usize,
    contexts: usize,
    revoked_vcs: usize,
    status_lists: usize,
}

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    online: bool,
    offline_mode: bool,
    last_online_time: Option<String>,
    organization_id: Option<String>,
    uptime_secs: u64,
    cache: CacheCounts,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncMetadata {
    last_sync_time: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackoffState {
    consecutive_failures: u32,
    next_attempt_at: Option<String>,
}

#[derive(Deserialize)]
struct SyncStatusResponse {
    organization_id: String,
    metadata: Option<SyncMetadata>,
    backoff: BackoffState,
}

pub async fn run(args: &StatusArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/status", args.endpoint);
    let resp = reqwest::get(&url).await;

    match resp {
        Ok(r) if r.status().is_success() => {
            let status: StatusResponse = r.json().await?;
            let connectivity = match (status.offline_mode, status.online) {
                (true, _) => "offline mode",
                (false, true) => "online",
                (false, false) => "offline",
            };
            println!("Node Status:");
            println!("  Version:       {}", status.version);
            println!("  Network:       {}", connectivity);
            println!(
                "  Last online:   {}",
                status.last_online_time.as_deref().unwrap_or("never")
            );
            println!(
                "  Organization:  {}",
                status.organization_id.as_deref().unwrap_or("(none)")
            );
            println!("  Uptime:        {}s", status.uptime_secs);
            println!("Cache:");
            println!("  Public keys:   {}", status.cache.public_keys);
            println!("  Contexts:      {}", status.cache.contexts);
            println!("  Revoked VCs:   {}", status.cache.revoked_vcs);
            println!("  Status lists:  {}", status.cache.status_lists);
        }
        Ok(r) => {
            anyhow::bail!("node returned HTTP {}", r.status());
        }
        Err(e) => {
            println!("Could not reach node at {}", args.endpoint);
            println!("  Error: {}", e);
            println!();
            println!("Is the node running? Start it with: veritas-node");
            return Ok(());
        }
    }

    if args.sync {
        let url = format!("{}/api/v1/sync/status", args.endpoint);
        let r = reqwest::get(&url).await?;
        if !r.status().is_success() {
            println!("Sync: (no organization configured)");
            return Ok(());
        }
        let sync: SyncStatusResponse = r.json().await?;
        println!("Sync ({}):", sync.organization_id);
        println!(
            "  Last sync:     {}",
            sync.metadata
                .as_ref()
                .map(|m| m.last_sync_time.as_str())
                .unwrap_or("never")
        );
        if sync.backoff.consecutive_failures > 0 {
            println!(
                "  Backing off:   {} failures, next attempt {}",
                sync.backoff.consecutive_failures,
                sync.backoff.next_attempt_at.as_deref().unwrap_or("now")
            );
        }
    }

    Ok(())
}
