use async_trait::async_trait;

use veritas_core::{KeyType, SignatureAlgorithm};
use veritas_crypto::PublicKey;

use super::PublicKeyResolver;
use crate::error::IdentityError;
use crate::key_data::PublicKeyData;

/// `did:key`: the key is the multibase method-specific identifier.
pub struct DidKeyResolver;

#[async_trait]
impl PublicKeyResolver for DidKeyResolver {
    async fn resolve(&self, verification_method: &str) -> Result<PublicKeyData, IdentityError> {
        let did = verification_method.split('#').next().unwrap_or_default();
        let multibase = did
            .strip_prefix("did:key:")
            .filter(|s| s.starts_with('z'))
            .ok_or_else(|| IdentityError::InvalidDid(verification_method.to_string()))?;
        let key = PublicKey::from_multibase(multibase)
            .map_err(|e| IdentityError::InvalidDid(format!("{}: {}", did, e)))?;
        let (key_type, algorithm) = match key {
            PublicKey::Ed25519(_) => (KeyType::Ed25519VerificationKey2020, SignatureAlgorithm::EdDSA),
            PublicKey::Secp256k1(_) => (
                KeyType::EcdsaSecp256k1VerificationKey2019,
                SignatureAlgorithm::ES256K,
            ),
            PublicKey::Rsa(_) => return Err(IdentityError::InvalidDid(did.to_string())),
        };
        let key_id = if verification_method.contains('#') {
            verification_method.to_string()
        } else {
            format!("{}#{}", did, multibase)
        };
        Ok(PublicKeyData {
            key_id,
            key_type: key_type.to_string(),
            algorithm: Some(algorithm),
            public_key_multibase: Some(multibase.to_string()),
            public_key_hex: None,
            public_key_jwk: None,
            public_key_pem: None,
            controller: did.to_string(),
            purpose: "assertion".into(),
        })
    }
}
