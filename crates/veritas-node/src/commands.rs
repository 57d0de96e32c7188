//! Commands dispatched from the HTTP API to the node event loop.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use veritas_core::{CredentialFormat, PresentationVerificationResult, VerificationResult};
use veritas_credentials::{CacheBundle, ItemsUpdated, PresentationOptions, PrimedFromVc};
use veritas_sync::{BackgroundSyncStatus, BackoffState, SyncMetadata, SyncResult, VersionStatus};

/// A command sent from the HTTP API to the node's main event loop.
pub enum NodeCommand {
    /// Verify a single credential.
    Verify {
        credential: String,
        format: CredentialFormat,
        reply: oneshot::Sender<Result<VerificationResult, String>>,
    },
    /// Verify a presentation and every credential inside it.
    VerifyPresentation {
        presentation: String,
        options: PresentationOptions,
        reply: oneshot::Sender<Result<PresentationVerificationResult, String>>,
    },
    /// Sync an organization, or the current one when none is given.
    Sync {
        organization_id: Option<String>,
        force: bool,
        reply: oneshot::Sender<Result<SyncResult, String>>,
    },
    /// Sync bookkeeping for an organization.
    SyncStatus {
        organization_id: Option<String>,
        reply: oneshot::Sender<Result<SyncStatusResponse, String>>,
    },
    /// Additive cache seeding from a server bundle.
    PrimeCache {
        bundle: CacheBundle,
        reply: oneshot::Sender<Result<ItemsUpdated, String>>,
    },
    /// Seed the issuer key and contexts a credential needs.
    PrimeFromCredential {
        credential: Value,
        reply: oneshot::Sender<Result<PrimedFromVc, String>>,
    },
    /// Wipe the cache, or one organization's share of it.
    ClearCache {
        organization_id: Option<String>,
        reply: oneshot::Sender<Result<(), String>>,
    },
    /// Node and cache overview.
    Status {
        reply: oneshot::Sender<Result<StatusResponse, String>>,
    },
}

/// Number of cached records per category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheCounts {
    pub public_keys: usize,
    pub contexts: usize,
    pub revoked_vcs: usize,
    pub status_lists: usize,
}

/// Response for `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub online: bool,
    pub offline_mode: bool,
    pub last_online_time: Option<String>,
    pub organization_id: Option<String>,
    pub uptime_secs: u64,
    pub cache: CacheCounts,
}

/// Response for `GET /sync/status`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusResponse {
    pub organization_id: String,
    pub metadata: Option<SyncMetadata>,
    pub version: VersionStatus,
    pub backoff: BackoffState,
    pub background: Option<BackgroundSyncStatus>,
}
