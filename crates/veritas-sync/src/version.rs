//! Change detection: decides whether an organization's cache is stale
//! before a full bundle is downloaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use veritas_cache::LocalCacheStore;
use veritas_credentials::CacheBundle;

use crate::client::BackendClient;
use crate::error::SyncError;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

fn state_key(organization_id: &str) -> String {
    format!("cache_version/{}", organization_id)
}

/// Per-category checksums of the last bundle applied for an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheVersion {
    pub organization_id: String,
    pub public_keys_hash: String,
    pub contexts_hash: String,
    #[serde(rename = "revokedVCsHash")]
    pub revoked_vcs_hash: String,
    pub last_modified: DateTime<Utc>,
    /// Milliseconds since the epoch when the version was written.
    pub version: i64,
}

impl CacheVersion {
    /// The checksum the backend publishes as `content_hash`.
    pub fn content_hash(&self) -> String {
        generate_hash(vec![
            Value::String(self.public_keys_hash.clone()),
            Value::String(self.contexts_hash.clone()),
            Value::String(self.revoked_vcs_hash.clone()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatus {
    pub has_local_cache: bool,
    pub last_sync_time: Option<i64>,
    /// -1 when nothing has been synced.
    pub cache_age_ms: i64,
    pub needs_time_based_sync: bool,
}

/// 32-bit `h * 31 + c` checksum over UTF-16 code units, rendered as signed
/// hex.
pub fn string_hash(content: &str) -> String {
    let mut hash: i32 = 0;
    for unit in content.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    if hash < 0 {
        format!("-{:x}", i64::from(hash).unsigned_abs())
    } else {
        format!("{:x}", hash)
    }
}

fn sort_key(item: &Value) -> String {
    ["key_id", "vc_id", "url"]
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| item.to_string())
}

/// Checksum of a record list, independent of its order.
pub fn generate_hash(mut items: Vec<Value>) -> String {
    items.sort_by_key(sort_key);
    string_hash(&Value::Array(items).to_string())
}

fn hash_records<T: Serialize>(records: &[T]) -> Result<String, SyncError> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(generate_hash(values))
}

pub struct CacheVersionService {
    store: Arc<LocalCacheStore>,
    client: BackendClient,
    stale_after: Duration,
}

impl CacheVersionService {
    pub fn new(store: Arc<LocalCacheStore>, client: BackendClient, stale_after: Duration) -> Self {
        Self {
            store,
            client,
            stale_after,
        }
    }

    pub fn get_local_version(&self, organization_id: &str) -> Result<Option<CacheVersion>, SyncError> {
        Ok(self.store.get_state(&state_key(organization_id))?)
    }

    /// Record the checksums of a bundle that was just applied.
    pub fn update_local_version(
        &self,
        organization_id: &str,
        bundle: &CacheBundle,
    ) -> Result<CacheVersion, SyncError> {
        let now = Utc::now();
        let version = CacheVersion {
            organization_id: organization_id.to_string(),
            public_keys_hash: hash_records(&bundle.public_keys)?,
            contexts_hash: hash_records(&bundle.contexts)?,
            revoked_vcs_hash: hash_records(&bundle.revoked_vcs)?,
            last_modified: now,
            version: now.timestamp_millis(),
        };
        self.store.put_state(&state_key(organization_id), &version)?;
        tracing::debug!(org = organization_id, content_hash = %version.content_hash(), "local cache version updated");
        Ok(version)
    }

    pub fn clear_local_version(&self, organization_id: &str) -> Result<(), SyncError> {
        self.store.delete_state(&state_key(organization_id))?;
        Ok(())
    }

    /// Compare the local version with the backend's cache-info. Falls back
    /// to the age of the local version when cache-info is unreachable.
    pub async fn needs_sync(&self, organization_id: &str) -> bool {
        let local = match self.get_local_version(organization_id) {
            Ok(Some(local)) => local,
            Ok(None) => {
                tracing::debug!(org = organization_id, "no local cache version, sync needed");
                return true;
            }
            Err(e) => {
                tracing::warn!(org = organization_id, error = %e, "unreadable cache version, sync needed");
                return true;
            }
        };

        let Some(server) = self.client.fetch_cache_info(organization_id).await else {
            let stale = self.needs_sync_by_time(organization_id, self.stale_after);
            tracing::debug!(org = organization_id, stale, "cache-info unreachable, using age");
            return stale;
        };

        let server_modified = server
            .last_modified
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        if let Some(server_modified) = server_modified {
            if server_modified > local.last_modified {
                tracing::debug!(org = organization_id, "server data newer, sync needed");
                return true;
            }
        }
        if let Some(hash) = server.content_hash.as_deref().filter(|h| !h.is_empty()) {
            if hash != local.content_hash() {
                tracing::debug!(org = organization_id, "content hash mismatch, sync needed");
                return true;
            }
        }
        tracing::debug!(org = organization_id, "cache up to date");
        false
    }

    /// True when no version exists or it is older than `max_age`.
    pub fn needs_sync_by_time(&self, organization_id: &str, max_age: Duration) -> bool {
        match self.get_local_version(organization_id) {
            Ok(Some(local)) => Utc::now().timestamp_millis() - local.version > max_age.as_millis() as i64,
            _ => true,
        }
    }

    pub fn get_sync_status(&self, organization_id: &str) -> VersionStatus {
        let local = self.get_local_version(organization_id).ok().flatten();
        let now = Utc::now().timestamp_millis();
        VersionStatus {
            has_local_cache: local.is_some(),
            last_sync_time: local.as_ref().map(|v| v.version),
            cache_age_ms: local.as_ref().map_or(-1, |v| now - v.version),
            needs_time_based_sync: self.needs_sync_by_time(organization_id, self.stale_after),
        }
    }
}
