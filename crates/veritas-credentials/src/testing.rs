//! Fixtures shared by the unit tests: a temporary cache, signed
//! credentials and status lists.

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
use veritas_core::{FixedConnectivity, VerifierConfig};
use veritas_crypto::encoding::{base64url_encode, multibase_decode, multibase_encode};
use veritas_crypto::{sign, verify_data, KeyPair};
use veritas_identity::{
    HttpFetcher, OfflineDocumentLoader, PublicKeyService, ResolverRegistry,
};

use crate::ldp::LdpVerifier;
use crate::revocation::{RevocationChecker, StatusListLoader};
use crate::validator::LdpValidator;
use crate::verifier::CredentialsVerifier;

pub const STATUS_LIST_URL: &str = "https://issuer.example/status/1";
pub const MIN_LIST_BITS: usize = 131_072;

pub struct TestEnv {
    _dir: TempDir,
    pub store: Arc<LocalCacheStore>,
    pub connectivity: Arc<FixedConnectivity>,
    pub keys: Arc<PublicKeyService>,
    pub loader: Arc<OfflineDocumentLoader>,
    pub fetcher: HttpFetcher,
}

impl TestEnv {
    /// A fresh store with the base credential contexts primed.
    pub fn new(online: bool) -> Self {
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
        let connectivity = Arc::new(FixedConnectivity::new(online));
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let registry = Arc::new(ResolverRegistry::with_defaults(fetcher.clone()));
        let keys = Arc::new(PublicKeyService::new(
            store.clone(),
            registry,
            connectivity.clone(),
        ));
        let loader = Arc::new(OfflineDocumentLoader::new(
            store.clone(),
            fetcher.clone(),
            connectivity.clone(),
        ));
        Self {
            _dir: dir,
            store,
            connectivity,
            keys,
            loader,
            fetcher,
        }
    }

    pub fn seed_ed25519_key(&self, kp: &KeyPair, key_id: &str) -> String {
        let mb = kp.public_key().to_multibase().unwrap();
        self.store
            .put(CachedPublicKey::new(key_id, "Ed25519VerificationKey2020").with_multibase(mb))
            .unwrap();
        key_id.to_string()
    }

    pub fn ldp(&self) -> LdpVerifier {
        LdpVerifier::new(self.keys.clone(), self.loader.clone())
    }

    pub fn status_list_loader(&self) -> StatusListLoader {
        StatusListLoader::new(self.store.clone(), self.fetcher.clone(), self.connectivity.clone())
    }

    pub fn revocation_checker(&self) -> RevocationChecker {
        RevocationChecker::new(
            self.store.clone(),
            self.status_list_loader(),
            Arc::new(self.ldp()),
            LdpValidator::default(),
            MIN_LIST_BITS,
        )
    }

    pub fn credentials_verifier(&self) -> CredentialsVerifier {
        CredentialsVerifier::new(
            Arc::new(self.ldp()),
            Arc::new(self.revocation_checker()),
            VerifierConfig::default(),
        )
    }
}

pub fn unsigned_v1() -> Value {
    json!({
        "@context": [CREDENTIALS_CONTEXT_V1_URL, ED25519_2020_CONTEXT_URL],
        "id": "https://issuer.example/credentials/42",
        "type": ["VerifiableCredential", "UniversityDegreeCredential"],
        "issuer": "did:web:issuer.example",
        "issuanceDate": "2024-01-01T00:00:00Z",
        "credentialSubject": {"id": "did:example:holder", "name": "Alice"}
    })
}

/// Attach an `Ed25519Signature2020` proof by `kp`.
pub fn sign_ed25519_2020(mut doc: Value, kp: &KeyPair, vm: &str) -> Value {
    doc["proof"] = json!({
        "type": "Ed25519Signature2020",
        "created": "2024-01-01T00:00:00Z",
        "verificationMethod": vm,
        "proofPurpose": "assertionMethod"
    });
    attach_proof_value(doc, kp)
}

/// Sign the proof options already present under `proof`.
pub fn attach_proof_value(mut doc: Value, kp: &KeyPair) -> Value {
    let data = verify_data(&doc, &doc["proof"]);
    doc["proof"]["proofValue"] = json!(sign(&data, kp).to_multibase());
    doc
}

/// Flip one bit of the signature.
pub fn tamper_signature(mut doc: Value) -> Value {
    let value = doc["proof"]["proofValue"].as_str().unwrap().to_string();
    let mut sig = multibase_decode(&value).unwrap();
    sig[0] ^= 0x01;
    doc["proof"]["proofValue"] = json!(multibase_encode(&sig));
    doc
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// A `u`-prefixed gzip bitstring of `total_bits` with `set` bits on.
pub fn encoded_list(set: &[usize], total_bits: usize) -> String {
    let mut bytes = vec![0u8; total_bits / 8];
    for &i in set {
        bytes[i / 8] |= 0x80 >> (i % 8);
    }
    format!("u{}", base64url_encode(&gzip(&bytes)))
}

/// A signed v2 `BitstringStatusListCredential`.
pub fn status_list_credential(set: &[usize], total_bits: usize, purpose: &str, kp: &KeyPair, vm: &str) -> Value {
    let list = json!({
        "@context": [CREDENTIALS_CONTEXT_V2_URL],
        "id": STATUS_LIST_URL,
        "type": ["VerifiableCredential", "BitstringStatusListCredential"],
        "issuer": "did:web:issuer.example",
        "validFrom": "2024-01-01T00:00:00Z",
        "credentialSubject": {
            "id": format!("{}#list", STATUS_LIST_URL),
            "type": "BitstringStatusList",
            "statusPurpose": purpose,
            "encodedList": encoded_list(set, total_bits)
        }
    });
    sign_ed25519_2020(list, kp, vm)
}
