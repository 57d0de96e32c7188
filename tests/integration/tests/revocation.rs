//! Bitstring status lists: fetched once while online, then read from the
//! cache with the network gone.

use serde_json::Value;
use veritas_cache::CachedStatusList;
use veritas_core::constants::{
    ERROR_CODE_VC_REVOKED, ERROR_CODE_VC_SUSPENDED, STATUS_LIST_LENGTH_ERROR,
    STATUS_RETRIEVAL_ERROR,
};
use veritas_core::CredentialFormat;
use veritas_crypto::KeyPair;
use veritas_integration_tests::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_ID: &str = "did:web:issuer.example#key-1";

/// Bits 0, 2, 3 and 5 set.
const FIRST_BYTE: u8 = 0xB4;

async fn serve_list(server: &MockServer, p: &str, list: &Value) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_json(list.clone()))
        .expect(1)
        .mount(server)
        .await;
}

fn credential_at(kp: &KeyPair, url: &str, index: usize, purpose: &str) -> String {
    let vc = with_status(
        unsigned_credential(&format!("urn:vc:{}", index), ISSUER_DID),
        url,
        index,
        purpose,
    );
    sign_ed25519_2020(vc, kp, KEY_ID).to_string()
}

// ============================================================================
// Revocation
// ============================================================================

#[tokio::test]
async fn test_fetched_list_is_reused_offline() {
    let h = Harness::new(true);
    let kp = KeyPair::generate();
    h.seed_key(&kp, KEY_ID);
    let server = MockServer::start().await;
    let url = format!("{}/status/1", server.uri());
    let list = status_list_credential(&url, &[FIRST_BYTE], MIN_LIST_BITS, "revocation", &kp, KEY_ID);
    serve_list(&server, "/status/1", &list).await;
    let verifier = h.credentials_verifier();

    let revoked = verifier
        .verify(&credential_at(&kp, &url, 5, "revocation"), CredentialFormat::LdpVc)
        .await;
    assert!(!revoked.status);
    assert_eq!(revoked.error_code, ERROR_CODE_VC_REVOKED);
    assert!(h.store.get::<CachedStatusList>(&url).unwrap().is_some());

    h.connectivity.set_online(false);
    for index in [1, 6] {
        let result = verifier
            .verify(&credential_at(&kp, &url, index, "revocation"), CredentialFormat::LdpVc)
            .await;
        assert!(result.status, "index {}: {}", index, result.message);
    }
    let again = verifier
        .verify(&credential_at(&kp, &url, 0, "revocation"), CredentialFormat::LdpVc)
        .await;
    assert_eq!(again.error_code, ERROR_CODE_VC_REVOKED);
}

#[tokio::test]
async fn test_suspension_bit() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    h.seed_key(&kp, KEY_ID);
    let url = "https://issuer.example/status/suspended";
    let list = status_list_credential(url, &[FIRST_BYTE], MIN_LIST_BITS, "suspension", &kp, KEY_ID);
    h.store.put(CachedStatusList::from_credential(url, list)).unwrap();

    let result = h
        .credentials_verifier()
        .verify(&credential_at(&kp, url, 3, "suspension"), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_VC_SUSPENDED);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_short_list_fails() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    h.seed_key(&kp, KEY_ID);
    let url = "https://issuer.example/status/short";
    let list = status_list_credential(url, &[0], 1024, "revocation", &kp, KEY_ID);
    h.store.put(CachedStatusList::from_credential(url, list)).unwrap();

    let result = h
        .credentials_verifier()
        .verify(&credential_at(&kp, url, 1, "revocation"), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, STATUS_LIST_LENGTH_ERROR);
}

#[tokio::test]
async fn test_uncached_list_offline_fails() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    h.seed_key(&kp, KEY_ID);

    let result = h
        .credentials_verifier()
        .verify(
            &credential_at(&kp, "https://issuer.example/status/missing", 1, "revocation"),
            CredentialFormat::LdpVc,
        )
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, STATUS_RETRIEVAL_ERROR);
}
