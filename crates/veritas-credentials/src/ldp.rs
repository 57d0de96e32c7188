//! Linked-data proof verification for `ldp_vc` credentials.

use serde_json::Value;
use std::sync::Arc;

use veritas_core::constants::{CONTEXT, JWS, PROOF, PROOF_VALUE};
use veritas_core::{ProofType, SignatureAlgorithm};
use veritas_crypto::encoding::multibase_decode;
use veritas_crypto::{verify, verify_data, DetachedJws, PublicKey};
use veritas_identity::{OfflineDocumentLoader, PublicKeyData, PublicKeyService};

use crate::error::CredentialError;

/// Cryptosuites accepted on a `DataIntegrityProof`.
pub const EDDSA_CRYPTOSUITES: [&str; 2] = ["eddsa-jcs-2022", "eddsa-rdfc-2022"];

/// JWS algorithms each detached-JWS suite may carry.
fn jws_algorithms(proof_type: ProofType) -> &'static [SignatureAlgorithm] {
    use SignatureAlgorithm::*;
    match proof_type {
        ProofType::RsaSignature2018 => &[RS256, PS256],
        ProofType::EcdsaSecp256k1Signature2019 => &[ES256K],
        ProofType::JsonWebSignature2020 => &[PS256, RS256, EdDSA, ES256K],
        _ => &[EdDSA],
    }
}

/// The proofs attached to a document, whether given as one object or an
/// array.
pub fn proofs(document: &Value) -> Vec<&Value> {
    match document.get(PROOF) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(proof) => vec![proof],
    }
}

/// The `verificationMethod` of a proof, given as an id or an embedded
/// method object.
pub fn verification_method(proof: &Value) -> Option<&str> {
    match proof.get("verificationMethod")? {
        Value::String(id) => Some(id),
        other => other.get("id").and_then(Value::as_str),
    }
}

fn context_urls(value: &Value) -> Vec<&str> {
    match value.get(CONTEXT) {
        Some(Value::String(url)) => vec![url.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Verifies every linked-data proof on a document against keys from the
/// cache-first key service.
pub struct LdpVerifier {
    keys: Arc<PublicKeyService>,
    loader: Arc<OfflineDocumentLoader>,
}

impl LdpVerifier {
    pub fn new(keys: Arc<PublicKeyService>, loader: Arc<OfflineDocumentLoader>) -> Self {
        Self { keys, loader }
    }

    /// Succeeds only when the document has at least one proof and every
    /// proof verifies.
    pub async fn verify(&self, document: &Value) -> Result<(), CredentialError> {
        self.preflight_contexts(document).await?;
        let proofs = proofs(document);
        if proofs.is_empty() {
            return Err(CredentialError::InvalidProof("document carries no proof".into()));
        }
        for proof in proofs {
            self.verify_proof(document, proof).await?;
        }
        Ok(())
    }

    /// Every `@context` URL on the document and its proofs must resolve,
    /// from the cache or (when online) the network.
    pub async fn preflight_contexts(&self, document: &Value) -> Result<(), CredentialError> {
        let mut urls = context_urls(document);
        for proof in proofs(document) {
            urls.extend(context_urls(proof));
        }
        for url in urls {
            self.loader.load(url).await?;
        }
        Ok(())
    }

    /// Verify a single proof, returning the key that verified it.
    pub async fn verify_proof(&self, document: &Value, proof: &Value) -> Result<PublicKeyData, CredentialError> {
        let proof_type: ProofType = proof
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .parse()?;
        let method = verification_method(proof)
            .ok_or_else(|| CredentialError::InvalidProof("proof has no verificationMethod".into()))?;
        let key_data = self.keys.get_public_key(method).await?;
        let key = key_data.decode()?;
        let data = verify_data(document, proof);

        check_signature(proof_type, proof, &key, &data)?;
        tracing::debug!(proof_type = %proof_type, key_id = %key_data.key_id, "proof verified");
        Ok(key_data)
    }
}

/// Check the signature carried by `proof` over `data`.
pub fn check_signature(
    proof_type: ProofType,
    proof: &Value,
    key: &PublicKey,
    data: &[u8],
) -> Result<(), CredentialError> {
    match proof_type {
        ProofType::Ed25519Signature2020 => check_proof_value(proof, key, data),
        ProofType::DataIntegrityProof => {
            let suite = proof
                .get("cryptosuite")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !EDDSA_CRYPTOSUITES.contains(&suite) {
                return Err(CredentialError::UnsupportedProof(format!("cryptosuite '{}'", suite)));
            }
            check_proof_value(proof, key, data)
        }
        jws_suite => {
            let jws = proof
                .get(JWS)
                .and_then(Value::as_str)
                .ok_or_else(|| CredentialError::InvalidProof(format!("{} proof has no jws", jws_suite)))?;
            let jws = DetachedJws::parse(jws)?;
            let alg = jws.algorithm()?;
            if !jws_algorithms(jws_suite).contains(&alg) {
                return Err(CredentialError::UnsupportedProof(format!(
                    "{} cannot carry {}",
                    jws_suite, alg
                )));
            }
            jws.verify(key, data)?;
            Ok(())
        }
    }
}

fn check_proof_value(proof: &Value, key: &PublicKey, data: &[u8]) -> Result<(), CredentialError> {
    let value = proof
        .get(PROOF_VALUE)
        .and_then(Value::as_str)
        .ok_or_else(|| CredentialError::InvalidProof("proof has no proofValue".into()))?;
    let signature = multibase_decode(value)?;
    verify(key, SignatureAlgorithm::EdDSA, data, &signature)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, TestEnv};
    use serde_json::json;
    use veritas_core::constants::CREDENTIALS_CONTEXT_V1_URL;
    use veritas_crypto::jws::{encode_detached, JwsHeader};
    use veritas_crypto::{sign, KeyPair};

    #[tokio::test]
    async fn test_ed25519_2020_roundtrip() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let vc = testing::sign_ed25519_2020(testing::unsigned_v1(), &kp, &vm);
        env.ldp().verify(&vc).await.unwrap();
    }

    #[tokio::test]
    async fn test_flipped_signature_fails() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let vc = testing::tamper_signature(testing::sign_ed25519_2020(testing::unsigned_v1(), &kp, &vm));
        let err = env.ldp().verify(&vc).await.unwrap_err();
        assert!(!err.is_offline());
    }

    #[tokio::test]
    async fn test_modified_claim_fails() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let mut vc = testing::sign_ed25519_2020(testing::unsigned_v1(), &kp, &vm);
        vc["credentialSubject"]["name"] = json!("Mallory");
        assert!(env.ldp().verify(&vc).await.is_err());
    }

    #[tokio::test]
    async fn test_uncached_context_offline() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let mut unsigned = testing::unsigned_v1();
        unsigned["@context"] = json!([CREDENTIALS_CONTEXT_V1_URL, "https://schema.example/uncached/v1"]);
        let vc = testing::sign_ed25519_2020(unsigned, &kp, &vm);
        let err = env.ldp().verify(&vc).await.unwrap_err();
        assert!(err.is_offline());
    }

    #[tokio::test]
    async fn test_uncached_key_offline() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vc = testing::sign_ed25519_2020(testing::unsigned_v1(), &kp, "did:web:issuer.example#key-1");
        assert!(env.ldp().verify(&vc).await.unwrap_err().is_offline());
    }

    #[tokio::test]
    async fn test_did_key_verifies_offline_without_cache() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let mb = kp.public_key().to_multibase().unwrap();
        let vm = format!("did:key:{}#{}", mb, mb);
        let vc = testing::sign_ed25519_2020(testing::unsigned_v1(), &kp, &vm);
        env.ldp().verify(&vc).await.unwrap();
    }

    #[tokio::test]
    async fn test_data_integrity_cryptosuites() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let mut unsigned = testing::unsigned_v1();
        unsigned["proof"] = json!({
            "type": "DataIntegrityProof",
            "cryptosuite": "eddsa-jcs-2022",
            "created": "2024-01-01T00:00:00Z",
            "verificationMethod": vm,
            "proofPurpose": "assertionMethod"
        });
        let vc = testing::attach_proof_value(unsigned, &kp);
        env.ldp().verify(&vc).await.unwrap();

        let mut other = vc.clone();
        other["proof"]["cryptosuite"] = json!("ecdsa-rdfc-2019");
        assert!(matches!(
            env.ldp().verify(&other).await,
            Err(CredentialError::UnsupportedProof(_))
        ));
    }

    #[tokio::test]
    async fn test_eddsa_jws_suite() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let mut vc = testing::unsigned_v1();
        let proof = json!({
            "type": "Ed25519Signature2018",
            "created": "2024-01-01T00:00:00Z",
            "verificationMethod": vm,
            "proofPurpose": "assertionMethod"
        });
        let data = verify_data(&vc, &proof);
        let jws = encode_detached(&JwsHeader::detached(SignatureAlgorithm::EdDSA), &data, |input| {
            Ok(sign(input, &kp).to_bytes().to_vec())
        })
        .unwrap();
        let mut signed = proof.clone();
        signed["jws"] = json!(jws);
        vc["proof"] = signed;
        env.ldp().verify(&vc).await.unwrap();
    }

    #[test]
    fn test_suite_algorithm_mismatch_rejected() {
        let kp = KeyPair::generate();
        let data = b"verify-data";
        let jws = encode_detached(&JwsHeader::detached(SignatureAlgorithm::EdDSA), data, |input| {
            Ok(sign(input, &kp).to_bytes().to_vec())
        })
        .unwrap();
        let proof = json!({"type": "RsaSignature2018", "jws": jws});
        let err = check_signature(ProofType::RsaSignature2018, &proof, &kp.public_key(), data).unwrap_err();
        assert!(matches!(err, CredentialError::UnsupportedProof(_)));
    }

    #[tokio::test]
    async fn test_every_proof_must_verify() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let vm2 = env.seed_ed25519_key(&other, "did:web:issuer.example#key-2");
        let first = testing::sign_ed25519_2020(testing::unsigned_v1(), &kp, &vm);
        let second = testing::sign_ed25519_2020(testing::unsigned_v1(), &other, &vm2);
        let mut vc = first.clone();
        vc["proof"] = json!([first["proof"], second["proof"]]);
        env.ldp().verify(&vc).await.unwrap();

        let bad = testing::tamper_signature(second);
        vc["proof"] = json!([first["proof"], bad["proof"]]);
        assert!(env.ldp().verify(&vc).await.is_err());
    }

    #[test]
    fn test_verification_method_forms() {
        assert_eq!(verification_method(&json!({"verificationMethod": "did:web:a#k"})), Some("did:web:a#k"));
        assert_eq!(
            verification_method(&json!({"verificationMethod": {"id": "did:web:a#k"}})),
            Some("did:web:a#k")
        );
        assert_eq!(verification_method(&json!({})), None);
    }
}
