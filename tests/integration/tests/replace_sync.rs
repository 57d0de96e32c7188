//! Organization sync feeding the offline verifier: what a sync writes is
//! what verification sees, and a later sync replaces it wholesale.

use serde_json::{json, Value};
use std::time::Duration;
use veritas_cache::{CachedPublicKey, CachedRevokedVc};
use veritas_core::constants::{ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING, ERROR_CODE_VC_REVOKED};
use veritas_core::CredentialFormat;
use veritas_crypto::KeyPair;
use veritas_integration_tests::*;
use veritas_sync::client::{CONTEXTS_PATH, PUBLIC_KEYS_PATH, REVOKED_VCS_PATH};
use veritas_sync::SyncOptions;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORG: &str = "org-1";

async fn serve(server: &MockServer, p: &str, body: Value, expect: u64) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expect)
        .mount(server)
        .await;
}

async fn serve_bundle(server: &MockServer, keys: &[(&str, &KeyPair)], revoked: &[&str], expect: u64) {
    let keys: Vec<Value> = keys
        .iter()
        .map(|(id, kp)| {
            json!({
                "key_id": id,
                "key_type": "Ed25519VerificationKey2020",
                "public_key_multibase": kp.public_key().to_multibase().unwrap()
            })
        })
        .collect();
    let revoked: Vec<Value> = revoked
        .iter()
        .map(|id| json!({"vc_id": id, "issuer": ISSUER_DID}))
        .collect();
    serve(server, PUBLIC_KEYS_PATH, json!({"keys": keys}), expect).await;
    serve(server, CONTEXTS_PATH, json!({"contexts": []}), expect).await;
    serve(server, REVOKED_VCS_PATH, json!({"revoked_vcs": revoked}), expect).await;
}

/// Disable the cooldown so consecutive syncs in one test both run.
fn no_cooldown() -> SyncOptions {
    SyncOptions {
        cooldown: Duration::ZERO,
        ..SyncOptions::default()
    }
}

// ============================================================================
// Sync then verify
// ============================================================================

#[tokio::test]
async fn test_synced_key_verifies_offline() {
    let server = MockServer::start().await;
    let kp = KeyPair::generate();
    let key_id = "did:web:issuer.example#key-1";
    serve_bundle(&server, &[(key_id, &kp)], &["urn:vc:revoked"], 1).await;
    let h = Harness::new(false);
    let sync = h.sync_service(&server.uri(), SyncOptions::default());

    let result = sync.sync_organization(ORG, false).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.items_updated.public_keys, 1);
    assert_eq!(result.items_updated.revoked_vcs, 1);

    let verifier = h.credentials_verifier();
    let good = sign_ed25519_2020(unsigned_credential("urn:vc:1", ISSUER_DID), &kp, key_id);
    let ok = verifier.verify(&good.to_string(), CredentialFormat::LdpVc).await;
    assert!(ok.status, "{}", ok.message);

    let gone = sign_ed25519_2020(unsigned_credential("urn:vc:revoked", ISSUER_DID), &kp, key_id);
    let revoked = verifier.verify(&gone.to_string(), CredentialFormat::LdpVc).await;
    assert!(!revoked.status);
    assert_eq!(revoked.error_code, ERROR_CODE_VC_REVOKED);
}

#[tokio::test]
async fn test_second_sync_drops_old_records() {
    let h = Harness::new(false);
    let old_kp = KeyPair::generate();
    let new_kp = KeyPair::generate();
    let old_id = "did:web:issuer.example#old";
    let new_id = "did:web:issuer.example#new";

    let first = MockServer::start().await;
    serve_bundle(&first, &[(old_id, &old_kp)], &["urn:vc:a"], 1).await;
    assert!(h.sync_service(&first.uri(), no_cooldown()).force_sync(ORG).await.success);

    let second = MockServer::start().await;
    serve_bundle(&second, &[(new_id, &new_kp)], &["urn:vc:b"], 1).await;
    let result = h.sync_service(&second.uri(), no_cooldown()).force_sync(ORG).await;
    assert!(result.success, "{:?}", result.error);

    assert!(h.store.get::<CachedPublicKey>(old_id).unwrap().is_none());
    assert!(h.store.get::<CachedPublicKey>(new_id).unwrap().is_some());
    assert!(h.store.get::<CachedRevokedVc>("urn:vc:a").unwrap().is_none());
    assert!(h.store.get::<CachedRevokedVc>("urn:vc:b").unwrap().is_some());

    let stale = sign_ed25519_2020(unsigned_credential("urn:vc:1", ISSUER_DID), &old_kp, old_id);
    let result = h
        .credentials_verifier()
        .verify(&stale.to_string(), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING);
}

#[tokio::test]
async fn test_unscoped_records_survive_sync() {
    let h = Harness::new(false);
    let local = KeyPair::generate();
    h.seed_key(&local, "did:web:local.example#key-1");

    let server = MockServer::start().await;
    serve_bundle(&server, &[], &[], 1).await;
    assert!(h.sync_service(&server.uri(), SyncOptions::default()).force_sync(ORG).await.success);

    assert!(h
        .store
        .get::<CachedPublicKey>("did:web:local.example#key-1")
        .unwrap()
        .is_some());
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn test_cooldown_skips_second_fetch() {
    let server = MockServer::start().await;
    serve_bundle(&server, &[], &[], 1).await;
    let h = Harness::new(false);
    let sync = h.sync_service(&server.uri(), SyncOptions::default());

    assert!(sync.sync_organization(ORG, false).await.success);
    let again = sync.sync_organization(ORG, false).await;
    assert!(again.success);
    assert!(again.skipped);
    // wiremock verifies `expect(1)` on drop.
}
