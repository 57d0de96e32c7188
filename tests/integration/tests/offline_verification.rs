//! Verification with the device offline: everything comes from the cache.

use serde_json::json;
use veritas_cache::CachedRevokedVc;
use veritas_core::constants::{
    CREDENTIALS_CONTEXT_V1_URL, ED25519_2020_CONTEXT_URL, ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING,
    ERROR_CODE_VERIFICATION_FAILED, ERROR_CODE_UNSUPPORTED_FORMAT, ERROR_CODE_VC_REVOKED,
};
use veritas_core::{CredentialFormat, ProofStatus, VcStatus};
use veritas_credentials::PresentationOptions;
use veritas_crypto::KeyPair;
use veritas_integration_tests::*;

const KEY_ID: &str = "did:web:issuer.example#key-1";

// ============================================================================
// Single credentials
// ============================================================================

#[tokio::test]
async fn test_cached_key_verifies_offline() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    let vm = h.seed_key(&kp, KEY_ID);
    let vc = sign_ed25519_2020(unsigned_credential("urn:vc:1", ISSUER_DID), &kp, &vm);

    let result = h
        .credentials_verifier()
        .verify(&vc.to_string(), CredentialFormat::LdpVc)
        .await;
    assert!(result.status, "{}", result.message);
    assert_eq!(result.error_code, "");
    assert_eq!(result.payload.unwrap()["id"], "urn:vc:1");
}

#[tokio::test]
async fn test_tampered_signature_fails() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    let vm = h.seed_key(&kp, KEY_ID);
    let vc = tamper_signature(sign_ed25519_2020(
        unsigned_credential("urn:vc:1", ISSUER_DID),
        &kp,
        &vm,
    ));

    let result = h
        .credentials_verifier()
        .verify(&vc.to_string(), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_VERIFICATION_FAILED);
}

#[tokio::test]
async fn test_edited_claim_fails() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    let vm = h.seed_key(&kp, KEY_ID);
    let mut vc = sign_ed25519_2020(unsigned_credential("urn:vc:1", ISSUER_DID), &kp, &vm);
    vc["credentialSubject"]["name"] = json!("Mallory");

    let result = h
        .credentials_verifier()
        .verify(&vc.to_string(), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_VERIFICATION_FAILED);
}

#[tokio::test]
async fn test_uncached_key_is_missing_dependency() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    let vc = sign_ed25519_2020(unsigned_credential("urn:vc:1", ISSUER_DID), &kp, KEY_ID);

    let result = h
        .credentials_verifier()
        .verify(&vc.to_string(), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING);
}

#[tokio::test]
async fn test_uncached_context_is_missing_dependency() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    let vm = h.seed_key(&kp, KEY_ID);
    let mut unsigned = unsigned_credential("urn:vc:1", ISSUER_DID);
    unsigned["@context"]
        .as_array_mut()
        .unwrap()
        .push(json!("https://schema.example/employee/v1"));
    let vc = sign_ed25519_2020(unsigned, &kp, &vm);

    let result = h
        .credentials_verifier()
        .verify(&vc.to_string(), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING);
}

#[tokio::test]
async fn test_revoked_record_fails() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    let vm = h.seed_key(&kp, KEY_ID);
    h.store.put(CachedRevokedVc::new("urn:vc:gone", ISSUER_DID)).unwrap();
    let vc = sign_ed25519_2020(unsigned_credential("urn:vc:gone", ISSUER_DID), &kp, &vm);

    let result = h
        .credentials_verifier()
        .verify(&vc.to_string(), CredentialFormat::LdpVc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_VC_REVOKED);
}

#[tokio::test]
async fn test_mso_mdoc_is_unsupported() {
    let h = Harness::new(false);
    let result = h
        .credentials_verifier()
        .verify("omdoc", CredentialFormat::MsoMdoc)
        .await;
    assert!(!result.status);
    assert_eq!(result.error_code, ERROR_CODE_UNSUPPORTED_FORMAT);
}

// ============================================================================
// Presentations
// ============================================================================

#[tokio::test]
async fn test_unsigned_presentation_reports_each_credential() {
    let h = Harness::new(false);
    let kp = KeyPair::generate();
    let vm = h.seed_key(&kp, KEY_ID);
    let good = sign_ed25519_2020(unsigned_credential("urn:vc:good", ISSUER_DID), &kp, &vm);
    let bad = tamper_signature(sign_ed25519_2020(
        unsigned_credential("urn:vc:bad", ISSUER_DID),
        &kp,
        &vm,
    ));
    let vp = json!({
        "@context": [CREDENTIALS_CONTEXT_V1_URL],
        "type": ["VerifiablePresentation"],
        "verifiableCredential": [good, bad]
    });
    let options = PresentationOptions {
        unsigned_presentation: true,
        ..PresentationOptions::default()
    };

    let result = h
        .presentation_verifier()
        .verify(&vp.to_string(), &options)
        .await
        .unwrap();
    assert_eq!(result.vc_results.len(), 2);
    assert_eq!(result.vc_results[0].vc_id, "urn:vc:good");
    assert_eq!(result.vc_results[0].status, VcStatus::Success);
    assert_eq!(result.vc_results[1].vc_id, "urn:vc:bad");
    assert_eq!(result.vc_results[1].status, VcStatus::Invalid);
    assert_eq!(result.proof_status, ProofStatus::Valid);
}

#[tokio::test]
async fn test_presentation_proof_must_be_for_authentication() {
    let h = Harness::new(false);
    let holder = KeyPair::generate();
    let vm = h.seed_key(&holder, "did:web:holder.example#key-1");
    let options = PresentationOptions {
        challenge: Some("nonce-1".into()),
        ..PresentationOptions::default()
    };

    for (purpose, expected) in [
        ("authentication", ProofStatus::Valid),
        ("assertionMethod", ProofStatus::Invalid),
    ] {
        let mut vp = json!({
            "@context": [CREDENTIALS_CONTEXT_V1_URL, ED25519_2020_CONTEXT_URL],
            "type": ["VerifiablePresentation"],
            "holder": "did:web:holder.example",
            "verifiableCredential": []
        });
        vp["proof"] = json!({
            "type": "Ed25519Signature2020",
            "created": "2024-01-01T00:00:00Z",
            "verificationMethod": vm,
            "proofPurpose": purpose,
            "challenge": "nonce-1"
        });
        let vp = attach_proof_value(vp, &holder).to_string();
        let result = h.presentation_verifier().verify(&vp, &options).await.unwrap();
        assert_eq!(result.proof_status, expected, "{}", purpose);
    }
}
