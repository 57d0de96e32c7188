//! did:web issuers: the key is resolved over the network once, written to
//! the cache, and serves offline verification afterwards.

use serde_json::json;
use veritas_cache::CachedPublicKey;
use veritas_core::constants::ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING;
use veritas_core::CredentialFormat;
use veritas_crypto::KeyPair;
use veritas_integration_tests::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn did_host(kp: &KeyPair, expect: u64) -> (MockServer, String) {
    let server = MockServer::start().await;
    let did = format!("did:web:{}", server.address().to_string().replace(':', "%3A"));
    let key_id = format!("{}#key-1", did);
    Mock::given(method("GET"))
        .and(path("/.well-known/did.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": did,
            "verificationMethod": [{
                "id": key_id,
                "type": "Ed25519VerificationKey2020",
                "controller": did,
                "publicKeyMultibase": kp.public_key().to_multibase().unwrap()
            }],
            "assertionMethod": [key_id]
        })))
        .expect(expect)
        .mount(&server)
        .await;
    (server, did)
}

// ============================================================================
// Resolution
// ============================================================================

#[tokio::test]
async fn test_resolved_key_is_cached_for_offline_use() {
    let kp = KeyPair::generate();
    let (_server, did) = did_host(&kp, 1).await;
    let key_id = format!("{}#key-1", did);
    let h = Harness::with_http_did_web(true);
    let vc = sign_ed25519_2020(unsigned_credential("urn:vc:web", &did), &kp, &key_id).to_string();
    let verifier = h.credentials_verifier();

    let online = verifier.verify(&vc, CredentialFormat::LdpVc).await;
    assert!(online.status, "{}", online.message);
    let cached = h.store.get::<CachedPublicKey>(&key_id).unwrap().unwrap();
    assert_eq!(cached.controller, did);
    assert!(cached.organization_id.is_none());

    h.connectivity.set_online(false);
    let offline = verifier.verify(&vc, CredentialFormat::LdpVc).await;
    assert!(offline.status, "{}", offline.message);
    // wiremock verifies the document was fetched exactly once.
}

#[tokio::test]
async fn test_unreachable_host_is_missing_dependency() {
    let kp = KeyPair::generate();
    let (server, did) = did_host(&kp, 0).await;
    let key_id = format!("{}#key-1", did);
    drop(server);
    let h = Harness::with_http_did_web(true);
    let vc = sign_ed25519_2020(unsigned_credential("urn:vc:web", &did), &kp, &key_id).to_string();

    let result = h.credentials_verifier().verify(&vc, CredentialFormat::LdpVc).await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING);
}
