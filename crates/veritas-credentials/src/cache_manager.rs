//! Seeds and replaces the local cache from backend bundles or from a
//! single credential seen while online.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use veritas_cache::{
    CachedContext, CachedPublicKey, CachedRevokedVc, CachedStatusList, Category, ContextSource,
    LocalCacheStore,
};
use veritas_core::constants::{CONTEXT, ISSUER, PROOF};
use veritas_core::Connectivity;
use veritas_identity::{HttpFetcher, PublicKeyService};

use crate::error::CredentialError;
use crate::ldp::verification_method;

/// A context document as delivered inside a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub url: String,
    pub document: Value,
}

/// Records for one organization as served by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheBundle {
    #[serde(default)]
    pub public_keys: Vec<CachedPublicKey>,
    #[serde(default)]
    pub contexts: Vec<ContextEntry>,
    /// Used only when `contexts` is empty.
    #[serde(default)]
    pub context_urls: Vec<String>,
    #[serde(default, rename = "revokedVCs", alias = "revokedVcs")]
    pub revoked_vcs: Vec<CachedRevokedVc>,
    /// `None` leaves cached status lists untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_list_credentials: Option<Vec<Value>>,
}

impl CacheBundle {
    pub fn is_empty(&self) -> bool {
        self.public_keys.is_empty()
            && self.contexts.is_empty()
            && self.context_urls.is_empty()
            && self.revoked_vcs.is_empty()
            && self.status_list_credentials.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Records written per category by a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsUpdated {
    pub public_keys: usize,
    pub contexts: usize,
    pub revoked_vcs: usize,
    pub status_lists: usize,
}

impl ItemsUpdated {
    pub fn total(&self) -> usize {
        self.public_keys + self.contexts + self.revoked_vcs + self.status_lists
    }
}

/// What `prime_from_vc` wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimedFromVc {
    pub cached_key_id: String,
    pub cached_contexts: Vec<String>,
}

pub struct CacheManager {
    store: Arc<LocalCacheStore>,
    keys: Arc<PublicKeyService>,
    fetcher: HttpFetcher,
    connectivity: Arc<dyn Connectivity>,
}

impl CacheManager {
    pub fn new(
        store: Arc<LocalCacheStore>,
        keys: Arc<PublicKeyService>,
        fetcher: HttpFetcher,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            store,
            keys,
            fetcher,
            connectivity,
        }
    }

    pub fn store(&self) -> &Arc<LocalCacheStore> {
        &self.store
    }

    /// Additive seed: nothing already cached is removed.
    pub async fn prime_from_server(&self, bundle: CacheBundle) -> Result<ItemsUpdated, CredentialError> {
        let mut updated = ItemsUpdated::default();
        if !bundle.public_keys.is_empty() {
            updated.public_keys = self.store.put_all(bundle.public_keys)?;
        }
        let contexts = self.bundle_contexts(&bundle.contexts, &bundle.context_urls).await;
        if !contexts.is_empty() {
            let records = contexts
                .into_iter()
                .map(|c| CachedContext::new(c.url, c.document, ContextSource::Prime))
                .collect();
            updated.contexts = self.store.put_all(records)?;
        }
        if !bundle.revoked_vcs.is_empty() {
            updated.revoked_vcs = self.store.put_all(bundle.revoked_vcs)?;
        }
        if let Some(lists) = bundle.status_list_credentials {
            updated.status_lists = self.store.put_all(status_list_records(lists))?;
        }
        tracing::info!(
            keys = updated.public_keys,
            contexts = updated.contexts,
            revoked = updated.revoked_vcs,
            "cache primed from bundle"
        );
        Ok(updated)
    }

    /// Replace every record scoped to `organization_id`, one category at a
    /// time. Contexts are replaced only when the bundle yields documents.
    pub async fn sync_from_server(
        &self,
        bundle: CacheBundle,
        organization_id: &str,
    ) -> Result<ItemsUpdated, CredentialError> {
        let mut updated = ItemsUpdated {
            public_keys: self
                .store
                .replace_for_org(organization_id, bundle.public_keys)?,
            ..ItemsUpdated::default()
        };

        let contexts = self.bundle_contexts(&bundle.contexts, &bundle.context_urls).await;
        if !contexts.is_empty() {
            let records = contexts
                .into_iter()
                .map(|c| CachedContext::new(c.url, c.document, ContextSource::OrgSync))
                .collect();
            updated.contexts = self.store.replace_for_org(organization_id, records)?;
        }

        updated.revoked_vcs = self
            .store
            .replace_for_org(organization_id, bundle.revoked_vcs)?;

        if let Some(lists) = bundle.status_list_credentials {
            updated.status_lists = self
                .store
                .replace_for_org(organization_id, status_list_records(lists))?;
        }

        tracing::info!(
            org = organization_id,
            keys = updated.public_keys,
            contexts = updated.contexts,
            revoked = updated.revoked_vcs,
            status_lists = updated.status_lists,
            "organization cache replaced"
        );
        Ok(updated)
    }

    /// Resolve and cache the issuer key and context documents of a
    /// credential. Accepts the credential itself or an envelope holding it
    /// under `credential`, `verifiableCredential` or `vc`.
    pub async fn prime_from_vc(&self, envelope: &Value) -> Result<PrimedFromVc, CredentialError> {
        let vc = unwrap_envelope(envelope)
            .ok_or_else(|| CredentialError::Malformed("cannot locate credential object".into()))?;

        let context_urls: Vec<String> = match vc.get(CONTEXT) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

        let issuer = match vc.get(ISSUER) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(obj) => obj.get("id").and_then(Value::as_str),
            None => None,
        };
        let key_ref = vc
            .get(PROOF)
            .and_then(first_item)
            .and_then(verification_method)
            .or(issuer)
            .ok_or_else(|| CredentialError::Malformed("missing issuer or verificationMethod".into()))?
            .to_string();

        let mut key = self.keys.get_public_key(&key_ref).await?;
        key.key_id = key_ref.clone();
        self.keys.cache_key(&key, None)?;

        if self.connectivity.is_online() && !context_urls.is_empty() {
            let documents = self.fetch_contexts(&context_urls).await;
            let records = documents
                .into_iter()
                .map(|c| CachedContext::new(c.url, c.document, ContextSource::Prime))
                .collect();
            self.store.put_all(records)?;
        }

        tracing::info!(key_id = %key_ref, contexts = context_urls.len(), "cache primed from credential");
        Ok(PrimedFromVc {
            cached_key_id: key_ref,
            cached_contexts: context_urls,
        })
    }

    pub fn is_context_cached(&self, url: &str) -> Result<bool, CredentialError> {
        Ok(self.store.get::<CachedContext>(url)?.is_some())
    }

    /// Logout: drop every cached record and all sync state.
    pub fn clear_all(&self) -> Result<(), CredentialError> {
        self.store.clear_all()?;
        tracing::info!("cache cleared");
        Ok(())
    }

    pub fn clear_organization(&self, organization_id: &str) -> Result<(), CredentialError> {
        self.store.clear_organization(organization_id)?;
        tracing::info!(org = organization_id, "organization cache cleared");
        Ok(())
    }

    pub fn counts(&self) -> Result<Vec<(Category, usize)>, CredentialError> {
        Category::ALL
            .iter()
            .map(|c| Ok((*c, self.store.count(*c)?)))
            .collect()
    }

    async fn bundle_contexts(&self, contexts: &[ContextEntry], urls: &[String]) -> Vec<ContextEntry> {
        if !contexts.is_empty() {
            return contexts.to_vec();
        }
        if urls.is_empty() || !self.connectivity.is_online() {
            return Vec::new();
        }
        let unique: Vec<String> = urls.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        self.fetch_contexts(&unique).await
    }

    /// Failed fetches are skipped.
    async fn fetch_contexts(&self, urls: &[String]) -> Vec<ContextEntry> {
        let mut out = Vec::new();
        for url in urls {
            match self.fetcher.get_json(url).await {
                Ok(document) => out.push(ContextEntry {
                    url: url.clone(),
                    document,
                }),
                Err(e) => tracing::warn!(url = %url, error = %e, "context fetch failed"),
            }
        }
        out
    }
}

fn first_item(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn unwrap_envelope(envelope: &Value) -> Option<&Value> {
    let vc = ["credential", "verifiableCredential", "vc"]
        .iter()
        .find_map(|field| envelope.get(*field).and_then(first_item))
        .unwrap_or(envelope);
    vc.is_object().then_some(vc)
}

fn status_list_records(lists: Vec<Value>) -> Vec<CachedStatusList> {
    lists
        .into_iter()
        .filter_map(|credential| {
            let id = credential.get("id").and_then(Value::as_str)?.to_string();
            Some(CachedStatusList::from_credential(id, credential))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;
    use serde_json::json;
    use veritas_crypto::KeyPair;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(env: &TestEnv) -> CacheManager {
        CacheManager::new(
            env.store.clone(),
            env.keys.clone(),
            env.fetcher.clone(),
            env.connectivity.clone(),
        )
    }

    fn key(id: &str) -> CachedPublicKey {
        CachedPublicKey::new(id, "Ed25519VerificationKey2020")
            .with_multibase(KeyPair::generate().public_key().to_multibase().unwrap())
    }

    fn bundle(keys: &[&str], revoked: &[&str]) -> CacheBundle {
        CacheBundle {
            public_keys: keys.iter().map(|k| key(k)).collect(),
            contexts: vec![ContextEntry {
                url: "https://org.example/ctx/v1".into(),
                document: json!({"@context": {"name": "https://schema.org/name"}}),
            }],
            revoked_vcs: revoked
                .iter()
                .map(|id| CachedRevokedVc::new(*id, "did:web:org.example"))
                .collect(),
            ..CacheBundle::default()
        }
    }

    #[test]
    fn test_bundle_wire_shape() {
        let parsed: CacheBundle = serde_json::from_value(json!({
            "publicKeys": [{"key_id": "did:web:a#k", "key_type": "Ed25519VerificationKey2020",
                            "public_key_multibase": "z6Mk", "controller": "did:web:a"}],
            "contextUrls": ["https://a.example/ctx"],
            "revokedVCs": [{"vc_id": "urn:vc:1", "issuer": "did:web:a"}]
        }))
        .unwrap();
        assert_eq!(parsed.public_keys[0].key_id, "did:web:a#k");
        assert_eq!(parsed.context_urls.len(), 1);
        assert_eq!(parsed.revoked_vcs[0].vc_id, "urn:vc:1");
        assert!(parsed.status_list_credentials.is_none());
        assert!(!parsed.is_empty());
        assert!(CacheBundle::default().is_empty());
    }

    #[tokio::test]
    async fn test_replace_sync_drops_previous_records() {
        let env = TestEnv::new(false);
        let mgr = manager(&env);
        mgr.sync_from_server(bundle(&["did:web:org.example#k1"], &["urn:vc:1"]), "org-1")
            .await
            .unwrap();
        let updated = mgr
            .sync_from_server(bundle(&["did:web:org.example#k2"], &[]), "org-1")
            .await
            .unwrap();
        assert_eq!(updated.public_keys, 1);
        assert_eq!(updated.revoked_vcs, 0);

        assert!(env.store.get::<CachedPublicKey>("did:web:org.example#k1").unwrap().is_none());
        assert!(env.store.get::<CachedPublicKey>("did:web:org.example#k2").unwrap().is_some());
        assert!(env.store.is_revoked("urn:vc:1").unwrap().is_none());

        let ctx = env.store.get::<CachedContext>("https://org.example/ctx/v1").unwrap().unwrap();
        assert_eq!(ctx.source, ContextSource::OrgSync);
        assert_eq!(ctx.organization_id.as_deref(), Some("org-1"));
    }

    #[tokio::test]
    async fn test_sync_leaves_other_organizations() {
        let env = TestEnv::new(false);
        let mgr = manager(&env);
        mgr.sync_from_server(bundle(&["did:web:a.example#k"], &[]), "org-a").await.unwrap();
        mgr.sync_from_server(bundle(&["did:web:b.example#k"], &[]), "org-b").await.unwrap();
        mgr.sync_from_server(CacheBundle::default(), "org-a").await.unwrap();

        assert!(env.store.get::<CachedPublicKey>("did:web:a.example#k").unwrap().is_none());
        assert!(env.store.get::<CachedPublicKey>("did:web:b.example#k").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prime_is_additive() {
        let env = TestEnv::new(false);
        let mgr = manager(&env);
        mgr.prime_from_server(bundle(&["did:web:a.example#k1"], &[])).await.unwrap();
        mgr.prime_from_server(bundle(&["did:web:a.example#k2"], &["urn:vc:9"])).await.unwrap();

        assert!(env.store.get::<CachedPublicKey>("did:web:a.example#k1").unwrap().is_some());
        assert!(env.store.get::<CachedPublicKey>("did:web:a.example#k2").unwrap().is_some());
        assert!(env.store.is_revoked("urn:vc:9").unwrap().is_some());
        assert!(mgr.is_context_cached("https://org.example/ctx/v1").unwrap());
    }

    #[tokio::test]
    async fn test_context_urls_fetched_when_online() {
        let env = TestEnv::new(true);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ctx/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"@context": {}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ctx/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let ok = format!("{}/ctx/ok", server.uri());
        let missing = format!("{}/ctx/missing", server.uri());
        let bundle = CacheBundle {
            context_urls: vec![ok.clone(), missing.clone(), ok.clone()],
            ..CacheBundle::default()
        };
        let updated = manager(&env).sync_from_server(bundle, "org-1").await.unwrap();
        assert_eq!(updated.contexts, 1);
        assert!(env.store.get::<CachedContext>(&ok).unwrap().is_some());
        assert!(env.store.get::<CachedContext>(&missing).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context_urls_skipped_offline() {
        let env = TestEnv::new(false);
        let bundle = CacheBundle {
            context_urls: vec!["https://org.example/ctx/offline".into()],
            ..CacheBundle::default()
        };
        let updated = manager(&env).prime_from_server(bundle).await.unwrap();
        assert_eq!(updated.contexts, 0);
    }

    #[tokio::test]
    async fn test_status_lists_replaced_only_when_present() {
        let env = TestEnv::new(false);
        let mgr = manager(&env);
        let list = json!({"id": "https://org.example/status/1", "issuer": {"id": "did:web:org.example"},
                          "credentialSubject": {"statusPurpose": "revocation", "encodedList": "uAA"}});
        let with_lists = CacheBundle {
            status_list_credentials: Some(vec![list]),
            ..CacheBundle::default()
        };
        mgr.sync_from_server(with_lists, "org-1").await.unwrap();
        mgr.sync_from_server(CacheBundle::default(), "org-1").await.unwrap();

        let cached = env
            .store
            .get::<CachedStatusList>("https://org.example/status/1")
            .unwrap()
            .unwrap();
        assert_eq!(cached.issuer, "did:web:org.example");
    }

    #[tokio::test]
    async fn test_prime_from_vc_with_did_key() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let did = format!("did:key:{}", kp.public_key().to_multibase().unwrap());
        let vm = format!("{}#{}", did, kp.public_key().to_multibase().unwrap());
        let envelope = json!({
            "verifiableCredential": [{
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "issuer": did,
                "proof": {"type": "Ed25519Signature2020", "verificationMethod": vm}
            }]
        });
        let primed = manager(&env).prime_from_vc(&envelope).await.unwrap();
        assert_eq!(primed.cached_key_id, vm);
        assert_eq!(primed.cached_contexts, vec!["https://www.w3.org/2018/credentials/v1"]);
        let cached = env.store.get::<CachedPublicKey>(&vm).unwrap().unwrap();
        assert_eq!(cached.organization_id, None);
    }

    #[tokio::test]
    async fn test_prime_from_vc_rejects_non_objects() {
        let env = TestEnv::new(false);
        let err = manager(&env).prime_from_vc(&json!("just a string")).await.unwrap_err();
        assert!(matches!(err, CredentialError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_clear_all_and_organization() {
        let env = TestEnv::new(false);
        let mgr = manager(&env);
        mgr.sync_from_server(bundle(&["did:web:a.example#k"], &[]), "org-a").await.unwrap();
        mgr.sync_from_server(bundle(&["did:web:b.example#k"], &[]), "org-b").await.unwrap();

        mgr.clear_organization("org-a").unwrap();
        assert!(env.store.get::<CachedPublicKey>("did:web:a.example#k").unwrap().is_none());
        assert!(env.store.get::<CachedPublicKey>("did:web:b.example#k").unwrap().is_some());

        mgr.clear_all().unwrap();
        assert!(mgr.counts().unwrap().iter().all(|(_, n)| *n == 0));
    }
}
