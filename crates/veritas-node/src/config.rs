//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use veritas_core::VerifierConfig;
use veritas_sync::{BackgroundSyncOptions, SyncOptions};

/// Full configuration for the offline verifier node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OfflineVerifierConfig {
    /// Organization backend the cache is synchronized from.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync scheduling and backoff.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Connectivity probing.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Verification thresholds and timeouts.
    #[serde(default)]
    pub verification: VerifierConfig,

    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the organization backend.
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Bearer token sent with backend requests.
    #[serde(default)]
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the cache directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run the background sync worker.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Organization whose cache this node keeps.
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_periodic_interval_secs")]
    pub periodic_interval_secs: u64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// Age after which the cache is stale when cache-info is unreachable.
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Never touch the network: no probes, no syncs, no fetches.
    #[serde(default)]
    pub offline: bool,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_backend_url() -> String {
    "http://127.0.0.1:8000".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_true() -> bool {
    true
}
fn default_interval_minutes() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_cooldown_secs() -> u64 {
    10
}
fn default_periodic_interval_secs() -> u64 {
    90
}
fn default_attempt_timeout_secs() -> u64 {
    60
}
fn default_backoff_base_secs() -> u64 {
    5
}
fn default_backoff_max_secs() -> u64 {
    15 * 60
}
fn default_stale_after_minutes() -> u64 {
    30
}
fn default_probe_interval_secs() -> u64 {
    30
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    9101
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            organization_id: None,
            interval_minutes: default_interval_minutes(),
            max_retries: default_max_retries(),
            cooldown_secs: default_cooldown_secs(),
            periodic_interval_secs: default_periodic_interval_secs(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            stale_after_minutes: default_stale_after_minutes(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            offline: false,
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl OfflineVerifierConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: OfflineVerifierConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            cooldown: Duration::from_secs(self.sync.cooldown_secs),
            periodic_interval: Duration::from_secs(self.sync.periodic_interval_secs),
            attempt_timeout: Duration::from_secs(self.sync.attempt_timeout_secs),
            backoff_base: Duration::from_secs(self.sync.backoff_base_secs),
            backoff_max: Duration::from_secs(self.sync.backoff_max_secs),
            stale_after: Duration::from_secs(self.sync.stale_after_minutes * 60),
        }
    }

    pub fn background_options(&self) -> BackgroundSyncOptions {
        BackgroundSyncOptions {
            enabled: self.sync.enabled && !self.network.offline && self.sync.organization_id.is_some(),
            interval_minutes: self.sync.interval_minutes,
            max_retries: self.sync.max_retries,
            organization_id: self.sync.organization_id.clone(),
        }
    }

    /// Address the local API binds to.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
