//! Fixtures for the cross-crate scenarios: a primed temporary cache, the
//! verifier graph wired over it, and signed credentials and status lists.

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use veritas_cache::{CachedContext, CachedPublicKey, ContextSource, LocalCacheStore};
use veritas_core::constants::{
    CREDENTIALS_CONTEXT_V1_URL, CREDENTIALS_CONTEXT_V2_URL, ED25519_2020_CONTEXT_URL,
};
use veritas_core::{DidMethod, FixedConnectivity, VerifierConfig};
use veritas_credentials::{
    CacheManager, CredentialsVerifier, LdpValidator, LdpVerifier, PresentationVerifier, RevocationChecker,
    StatusListLoader,
};
use veritas_crypto::encoding::{base64url_encode, multibase_decode, multibase_encode};
use veritas_crypto::{sign, verify_data, KeyPair};
use veritas_identity::{
    DidWebResolver, HttpFetcher, OfflineDocumentLoader, PublicKeyService, ResolverRegistry,
};
use veritas_sync::{BackendClient, CacheSyncService, NetworkService, SyncOptions};

pub const ISSUER_DID: &str = "did:web:issuer.example";
pub const MIN_LIST_BITS: usize = 131_072;

pub struct Harness {
    _dir: TempDir,
    pub store: Arc<LocalCacheStore>,
    pub connectivity: Arc<FixedConnectivity>,
    pub fetcher: HttpFetcher,
    registry: Arc<ResolverRegistry>,
}

impl Harness {
    /// A fresh cache with the base credential contexts primed.
    pub fn new(online: bool) -> Self {
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let registry = Arc::new(ResolverRegistry::with_defaults(fetcher.clone()));
        Self::with_registry(online, fetcher, registry)
    }

    /// did:web documents are fetched over plain HTTP, for mock hosts.
    pub fn with_http_did_web(online: bool) -> Self {
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let mut registry = ResolverRegistry::with_defaults(fetcher.clone());
        registry.register(
            DidMethod::Web,
            Box::new(DidWebResolver::new(fetcher.clone()).with_scheme("http")),
        );
        Self::with_registry(online, fetcher, Arc::new(registry))
    }

    fn with_registry(online: bool, fetcher: HttpFetcher, registry: Arc<ResolverRegistry>) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalCacheStore::open(dir.path()).unwrap());
        for url in [
            CREDENTIALS_CONTEXT_V1_URL,
            CREDENTIALS_CONTEXT_V2_URL,
            ED25519_2020_CONTEXT_URL,
        ] {
            store
                .put(CachedContext::new(url, json!({"@context": {}}), ContextSource::Prime))
                .unwrap();
        }
        Self {
            _dir: dir,
            store,
            connectivity: Arc::new(FixedConnectivity::new(online)),
            fetcher,
            registry,
        }
    }

    pub fn keys(&self) -> Arc<PublicKeyService> {
        Arc::new(PublicKeyService::new(
            self.store.clone(),
            self.registry.clone(),
            self.connectivity.clone(),
        ))
    }

    pub fn ldp(&self) -> Arc<LdpVerifier> {
        let loader = Arc::new(OfflineDocumentLoader::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.connectivity.clone(),
        ));
        Arc::new(LdpVerifier::new(self.keys(), loader))
    }

    pub fn credentials_verifier(&self) -> Arc<CredentialsVerifier> {
        let ldp = self.ldp();
        let revocation = RevocationChecker::new(
            self.store.clone(),
            StatusListLoader::new(self.store.clone(), self.fetcher.clone(), self.connectivity.clone()),
            ldp.clone(),
            LdpValidator::default(),
            MIN_LIST_BITS,
        );
        Arc::new(CredentialsVerifier::new(
            ldp,
            Arc::new(revocation),
            VerifierConfig::default(),
        ))
    }

    pub fn presentation_verifier(&self) -> PresentationVerifier {
        PresentationVerifier::new(self.ldp(), self.credentials_verifier())
    }

    /// A sync engine over the same cache, pointed at `backend_url` and
    /// reporting itself online.
    pub fn sync_service(&self, backend_url: &str, options: SyncOptions) -> Arc<CacheSyncService> {
        let client = BackendClient::new(backend_url, None, Duration::from_secs(5)).unwrap();
        let network = Arc::new(NetworkService::new(client.clone(), Duration::from_secs(1)));
        network.set_online(true);
        let cache = Arc::new(CacheManager::new(
            self.store.clone(),
            self.keys(),
            self.fetcher.clone(),
            network.clone(),
        ));
        Arc::new(CacheSyncService::new(
            self.store.clone(),
            client,
            cache,
            network,
            options,
        ))
    }

    /// Cache an Ed25519 key under `key_id`.
    pub fn seed_key(&self, kp: &KeyPair, key_id: &str) -> String {
        let mb = kp.public_key().to_multibase().unwrap();
        self.store
            .put(CachedPublicKey::new(key_id, "Ed25519VerificationKey2020").with_multibase(mb))
            .unwrap();
        key_id.to_string()
    }
}

pub fn unsigned_credential(id: &str, issuer: &str) -> Value {
    json!({
        "@context": [CREDENTIALS_CONTEXT_V1_URL, ED25519_2020_CONTEXT_URL],
        "id": id,
        "type": ["VerifiableCredential", "EmployeeCredential"],
        "issuer": issuer,
        "issuanceDate": "2024-01-01T00:00:00Z",
        "credentialSubject": {"id": "did:example:holder", "name": "Alice"}
    })
}

/// Attach an `Ed25519Signature2020` proof with the given purpose.
pub fn sign_with_purpose(mut doc: Value, kp: &KeyPair, vm: &str, purpose: &str) -> Value {
    doc["proof"] = json!({
        "type": "Ed25519Signature2020",
        "created": "2024-01-01T00:00:00Z",
        "verificationMethod": vm,
        "proofPurpose": purpose
    });
    attach_proof_value(doc, kp)
}

/// Sign the proof options already present under `proof`.
pub fn attach_proof_value(mut doc: Value, kp: &KeyPair) -> Value {
    let data = verify_data(&doc, &doc["proof"]);
    doc["proof"]["proofValue"] = json!(sign(&data, kp).to_multibase());
    doc
}

pub fn sign_ed25519_2020(doc: Value, kp: &KeyPair, vm: &str) -> Value {
    sign_with_purpose(doc, kp, vm, "assertionMethod")
}

/// Flip one bit of the signature.
pub fn tamper_signature(mut doc: Value) -> Value {
    let value = doc["proof"]["proofValue"].as_str().unwrap().to_string();
    let mut sig = multibase_decode(&value).unwrap();
    sig[0] ^= 0x01;
    doc["proof"]["proofValue"] = json!(multibase_encode(&sig));
    doc
}

/// `u`-prefixed base64url of the gzip of `bytes`, padded with zeros to
/// `total_bits`.
pub fn encoded_list(bytes: &[u8], total_bits: usize) -> String {
    let mut raw = bytes.to_vec();
    raw.resize(total_bits / 8, 0);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    format!("u{}", base64url_encode(&encoder.finish().unwrap()))
}

/// A signed `BitstringStatusListCredential` whose list starts with `bytes`.
pub fn status_list_credential(
    url: &str,
    bytes: &[u8],
    total_bits: usize,
    purpose: &str,
    kp: &KeyPair,
    vm: &str,
) -> Value {
    let list = json!({
        "@context": [CREDENTIALS_CONTEXT_V2_URL],
        "id": url,
        "type": ["VerifiableCredential", "BitstringStatusListCredential"],
        "issuer": ISSUER_DID,
        "validFrom": "2024-01-01T00:00:00Z",
        "credentialSubject": {
            "id": format!("{}#list", url),
            "type": "BitstringStatusList",
            "statusPurpose": purpose,
            "encodedList": encoded_list(bytes, total_bits)
        }
    });
    sign_ed25519_2020(list, kp, vm)
}

/// Attach a `BitstringStatusListEntry` pointing at `index` of `url`.
pub fn with_status(mut vc: Value, url: &str, index: usize, purpose: &str) -> Value {
    vc["credentialStatus"] = json!({
        "id": format!("{}#{}", url, index),
        "type": "BitstringStatusListEntry",
        "statusPurpose": purpose,
        "statusListIndex": index.to_string(),
        "statusListCredential": url
    });
    vc
}
