//! HTTP client for the organization backend that serves cache bundles.
//!
//! Transport failures are retried with a short exponential backoff; status
//! errors are returned to the caller immediately.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use veritas_cache::{CachedPublicKey, CachedRevokedVc};
use veritas_credentials::{CacheBundle, ContextEntry};

use crate::error::SyncError;

pub const PUBLIC_KEYS_PATH: &str = "/organization/api/public-keys/";
pub const CONTEXTS_PATH: &str = "/organization/api/contexts/";
pub const REVOKED_VCS_PATH: &str = "/organization/api/revoked-vcs/";
pub const STATUS_LISTS_PATH: &str = "/organization/api/status-list-credentials/";
pub const CACHE_INFO_PATH: &str = "/organization/api/cache-info/";
pub const HEALTH_PATH: &str = "/health/";

/// Retries after the first attempt, transport errors only.
const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY_MS: u64 = 400;

/// Lightweight change metadata served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCacheInfo {
    pub organization_id: String,
    #[serde(default)]
    pub public_keys_count: u64,
    #[serde(default)]
    pub contexts_count: u64,
    #[serde(default)]
    pub revoked_vcs_count: u64,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

#[derive(Deserialize)]
struct KeysResponse {
    #[serde(default)]
    keys: Vec<CachedPublicKey>,
}

#[derive(Deserialize)]
struct ContextsResponse {
    #[serde(default)]
    contexts: Vec<ContextEntry>,
}

#[derive(Deserialize)]
struct RevokedResponse {
    #[serde(default)]
    revoked_vcs: Vec<CachedRevokedVc>,
}

#[derive(Deserialize)]
struct StatusListsResponse {
    #[serde(default)]
    status_list_credentials: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One unretried probe of `/health/`.
    pub async fn health(&self, timeout: Duration) -> bool {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "health probe failed");
                false
            }
        }
    }

    /// Keys, contexts and revoked credentials are required; status lists
    /// are optional and leave the cached lists alone when unavailable.
    pub async fn fetch_bundle(&self, organization_id: &str) -> Result<CacheBundle, SyncError> {
        let contexts = self
            .get::<ContextsResponse>(CONTEXTS_PATH, organization_id)
            .await?
            .contexts;
        let public_keys = self
            .get::<KeysResponse>(PUBLIC_KEYS_PATH, organization_id)
            .await?
            .keys;
        let revoked_vcs = match self.get::<RevokedResponse>(REVOKED_VCS_PATH, organization_id).await {
            Ok(resp) => resp.revoked_vcs,
            Err(SyncError::Status { status: 404, .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        let status_list_credentials = match self
            .get::<StatusListsResponse>(STATUS_LISTS_PATH, organization_id)
            .await
        {
            Ok(resp) => Some(
                resp.status_list_credentials
                    .into_iter()
                    .filter_map(unwrap_status_list)
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!(org = organization_id, error = %e, "status list credentials unavailable");
                None
            }
        };

        tracing::debug!(
            org = organization_id,
            keys = public_keys.len(),
            contexts = contexts.len(),
            revoked = revoked_vcs.len(),
            "bundle fetched"
        );
        Ok(CacheBundle {
            public_keys,
            contexts,
            context_urls: Vec::new(),
            revoked_vcs,
            status_list_credentials,
        })
    }

    /// `None` when the endpoint is unreachable or answers with an error.
    pub async fn fetch_cache_info(&self, organization_id: &str) -> Option<ServerCacheInfo> {
        match self.get::<ServerCacheInfo>(CACHE_INFO_PATH, organization_id).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(org = organization_id, error = %e, "cache-info unavailable");
                None
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, organization_id: &str) -> Result<T, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .send_with_retry(|| {
                let mut request = self
                    .client
                    .get(&url)
                    .query(&[("organization_id", organization_id)])
                    .header(reqwest::header::ACCEPT, "application/json");
                if let Some(token) = &self.token {
                    request = request.bearer_auth(token);
                }
                request.send()
            })
            .await
            .map_err(|source| SyncError::Http {
                endpoint: path.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        resp.json::<T>().await.map_err(|e| SyncError::Malformed {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })
    }

    async fn send_with_retry<F, Fut>(&self, f: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        for attempt in 0..MAX_RETRIES {
            match f().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        "backend request failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        f().await
    }
}

/// Status-list entries arrive either as bare credentials or wrapped with
/// their list id.
fn unwrap_status_list(item: Value) -> Option<Value> {
    let list_id = ["status_list_id", "statusListId", "id"]
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .map(str::to_string)?;
    let mut credential = ["full_credential", "fullCredential", "credential"]
        .iter()
        .find_map(|k| item.get(*k).filter(|v| v.is_object()).cloned())
        .unwrap_or(item);
    if credential.get("id").is_none() {
        if let Value::Object(map) = &mut credential {
            map.insert("id".into(), Value::String(list_id));
        }
    }
    Some(credential)
}
