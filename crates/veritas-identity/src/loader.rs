//! Offline-first JSON-LD document loader.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use veritas_cache::{CachedContext, CachedPublicKey, ContextSource, LocalCacheStore};
use veritas_core::Connectivity;

use crate::document::{controller_document, verification_method_document};
use crate::error::IdentityError;
use crate::http::HttpFetcher;
use crate::key_data::PublicKeyData;

/// Resolves `@context` URLs and DID URLs to documents.
///
/// A cache hit is returned immediately. On a miss the document is fetched
/// only while online, and persisted on success. Offline misses and failed
/// fetches both surface as `OfflineDependencyMissing`.
pub struct OfflineDocumentLoader {
    store: Arc<LocalCacheStore>,
    fetcher: HttpFetcher,
    connectivity: Arc<dyn Connectivity>,
}

impl OfflineDocumentLoader {
    pub fn new(
        store: Arc<LocalCacheStore>,
        fetcher: HttpFetcher,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            store,
            fetcher,
            connectivity,
        }
    }

    pub fn is_cached(&self, url: &str) -> Result<bool, IdentityError> {
        Ok(self.store.get::<CachedContext>(url)?.is_some())
    }

    pub async fn load(&self, url: &str) -> Result<Value, IdentityError> {
        if url.starts_with("did:") {
            return self.load_did(url);
        }
        if let Some(ctx) = self.store.get::<CachedContext>(url)? {
            return Ok(ctx.document);
        }
        if !self.connectivity.is_online() {
            tracing::debug!(url = url, "context not cached and offline");
            return Err(IdentityError::OfflineDependencyMissing(format!("context {}", url)));
        }

        match self.fetcher.get_json(url).await {
            Ok(document) => {
                let record = CachedContext::new(url, document.clone(), ContextSource::Network);
                if let Err(e) = self.store.put(record) {
                    tracing::warn!(url = url, error = %e, "failed to cache fetched context");
                }
                Ok(document)
            }
            Err(e) => {
                tracing::warn!(url = url, error = %e, "context fetch failed");
                Err(IdentityError::OfflineDependencyMissing(format!("context {}", url)))
            }
        }
    }

    /// DID URLs are answered from the key cache only.
    fn load_did(&self, url: &str) -> Result<Value, IdentityError> {
        let now = Utc::now();
        if url.contains('#') {
            return match self.store.get::<CachedPublicKey>(url)? {
                Some(key) if key.is_usable(now) => {
                    Ok(verification_method_document(&PublicKeyData::from(&key)))
                }
                _ => Err(IdentityError::OfflineDependencyMissing(format!(
                    "verification method {}",
                    url
                ))),
            };
        }
        let keys: Vec<PublicKeyData> = self
            .store
            .keys_by_controller(url)?
            .iter()
            .filter(|k| k.is_usable(now))
            .map(PublicKeyData::from)
            .collect();
        if keys.is_empty() {
            return Err(IdentityError::OfflineDependencyMissing(format!(
                "DID document {}",
                url
            )));
        }
        Ok(controller_document(url, &keys))
    }
}
