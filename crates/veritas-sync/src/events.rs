//! Events broadcast by the sync layer to whoever is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use veritas_credentials::ItemsUpdated;

/// Outcome of a sync attempt, as relayed to the foreground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEvent {
    SyncComplete {
        #[serde(rename = "organizationId")]
        organization_id: String,
        #[serde(rename = "itemsUpdated")]
        items_updated: ItemsUpdated,
        timestamp: DateTime<Utc>,
    },
    SyncError {
        #[serde(rename = "organizationId")]
        organization_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    pub fn organization_id(&self) -> &str {
        match self {
            Self::SyncComplete { organization_id, .. } | Self::SyncError { organization_id, .. } => {
                organization_id
            }
        }
    }
}

/// A verified change in backend reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}
