use async_trait::async_trait;
use serde_json::Value;

use veritas_core::{KeyType, SignatureAlgorithm};
use veritas_crypto::encoding::base64url_decode;
use veritas_crypto::PublicKey;

use super::PublicKeyResolver;
use crate::error::IdentityError;
use crate::key_data::PublicKeyData;

/// `did:jwk`: the method-specific id is a base64url-encoded public JWK.
pub struct DidJwkResolver;

#[async_trait]
impl PublicKeyResolver for DidJwkResolver {
    async fn resolve(&self, verification_method: &str) -> Result<PublicKeyData, IdentityError> {
        let did = verification_method.split('#').next().unwrap_or_default();
        let encoded = did
            .strip_prefix("did:jwk:")
            .ok_or_else(|| IdentityError::InvalidDid(verification_method.to_string()))?;
        let bytes = base64url_decode(encoded)
            .map_err(|e| IdentityError::InvalidDid(format!("{}: {}", did, e)))?;
        let jwk: Value = serde_json::from_slice(&bytes)?;
        let algorithm = match PublicKey::from_jwk(&jwk)? {
            PublicKey::Ed25519(_) => Some(SignatureAlgorithm::EdDSA),
            PublicKey::Secp256k1(_) => Some(SignatureAlgorithm::ES256K),
            // RS256 or PS256, decided by the proof's JWS header.
            PublicKey::Rsa(_) => None,
        };
        Ok(PublicKeyData {
            key_id: format!("{}#0", did),
            key_type: KeyType::JsonWebKey2020.to_string(),
            algorithm,
            public_key_multibase: None,
            public_key_hex: None,
            public_key_jwk: Some(jwk),
            public_key_pem: None,
            controller: did.to_string(),
            purpose: "assertion".into(),
        })
    }
}
