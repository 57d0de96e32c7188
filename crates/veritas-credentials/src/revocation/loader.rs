use serde_json::Value;
use std::sync::Arc;

use veritas_cache::{CachedStatusList, LocalCacheStore};
use veritas_core::constants::STATUS_RETRIEVAL_ERROR;
use veritas_core::Connectivity;
use veritas_identity::HttpFetcher;

use crate::error::CredentialError;

/// A status-list credential with the fields the checker reads pulled out.
#[derive(Debug, Clone)]
pub struct LoadedStatusList {
    pub id: Option<String>,
    pub purposes: Vec<String>,
    pub encoded_list: Option<String>,
    pub raw: Value,
}

impl LoadedStatusList {
    pub fn from_credential(raw: Value) -> Self {
        let subject = raw.get("credentialSubject").cloned().unwrap_or(Value::Null);
        let purposes = normalize_purposes(
            subject
                .get("statusPurpose")
                .or_else(|| subject.get("status_purpose")),
        );
        let encoded_list = subject
            .get("encodedList")
            .or_else(|| subject.get("encoded_list"))
            .or_else(|| raw.get("encodedList"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            id: raw.get("id").and_then(Value::as_str).map(str::to_string),
            purposes,
            encoded_list,
            raw,
        }
    }
}

/// Status purposes as a list, whether given as one string or several.
pub fn normalize_purposes(value: Option<&Value>) -> Vec<String> {
    let as_text = |v: &Value| match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    match value {
        Some(Value::Array(items)) => items.iter().map(as_text).filter(|s| !s.is_empty()).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => Some(as_text(single)).filter(|s| !s.is_empty()).into_iter().collect(),
    }
}

/// Cache-first retrieval of status-list credentials.
pub struct StatusListLoader {
    store: Arc<LocalCacheStore>,
    fetcher: HttpFetcher,
    connectivity: Arc<dyn Connectivity>,
}

impl StatusListLoader {
    pub fn new(store: Arc<LocalCacheStore>, fetcher: HttpFetcher, connectivity: Arc<dyn Connectivity>) -> Self {
        Self {
            store,
            fetcher,
            connectivity,
        }
    }

    /// Load the list at `url`. Fetched lists are cached unscoped under the
    /// requested URL. Any retrieval failure is `STATUS_RETRIEVAL_ERROR`.
    pub async fn load(&self, url: &str) -> Result<LoadedStatusList, CredentialError> {
        if let Some(cached) = self.store.get::<CachedStatusList>(url)? {
            tracing::debug!(url = url, issuer = %cached.issuer, "status list served from cache");
            return Ok(LoadedStatusList::from_credential(cached.full_credential));
        }
        if !self.connectivity.is_online() {
            return Err(CredentialError::revocation(
                STATUS_RETRIEVAL_ERROR,
                format!("status list {} not cached and device is offline", url),
            ));
        }

        tracing::warn!(url = url, "status list cache miss, fetching");
        let credential = self.fetcher.get_json(url).await.map_err(|e| {
            tracing::warn!(url = url, error = %e, "status list retrieval failed");
            CredentialError::revocation(STATUS_RETRIEVAL_ERROR, format!("{}: {}", url, e))
        })?;
        if let Err(e) = self
            .store
            .put(CachedStatusList::from_credential(url, credential.clone()))
        {
            tracing::warn!(url = url, error = %e, "failed to cache status list");
        }
        Ok(LoadedStatusList::from_credential(credential))
    }
}
