use veritas_cache::CacheError;
use veritas_credentials::CredentialError;

/// Sync-layer errors. These stay inside the crate: the public sync entry
/// points report them through `SyncResult::error`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no network connection")]
    Offline,

    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("sync attempt timed out after {0} ms")]
    Timeout(u64),

    #[error("backing off after {failures} failures, next attempt at {next_attempt_at}")]
    BackingOff {
        failures: u32,
        next_attempt_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("background sync worker has stopped")]
    WorkerStopped,

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Failures that count towards backoff. Skips and gating do not.
    pub fn is_attempt_failure(&self) -> bool {
        !matches!(
            self,
            Self::Offline | Self::BackingOff { .. } | Self::WorkerStopped
        )
    }
}
