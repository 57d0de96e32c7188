use serde::{Deserialize, Serialize};
use serde_json::Value;

use veritas_cache::records::controller_of;
use veritas_cache::CachedPublicKey;
use veritas_core::{KeyType, SignatureAlgorithm};
use veritas_crypto::PublicKey;

use crate::document::VerificationMethod;
use crate::error::IdentityError;

/// Resolved key material in the one shape every resolver produces and every
/// signature suite consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyData {
    pub key_id: String,
    pub key_type: String,
    pub algorithm: Option<SignatureAlgorithm>,
    pub public_key_multibase: Option<String>,
    pub public_key_hex: Option<String>,
    pub public_key_jwk: Option<Value>,
    pub public_key_pem: Option<String>,
    pub controller: String,
    pub purpose: String,
}

impl PublicKeyData {
    fn algorithm_for(key_type: &str) -> Option<SignatureAlgorithm> {
        key_type
            .parse::<KeyType>()
            .ok()
            .and_then(|kt| kt.default_algorithm())
    }

    pub fn from_verification_method(vm: &VerificationMethod, purpose: &str) -> Self {
        Self {
            key_id: vm.id.clone(),
            key_type: vm.method_type.clone(),
            algorithm: Self::algorithm_for(&vm.method_type),
            public_key_multibase: vm.public_key_multibase.clone(),
            public_key_hex: vm.public_key_hex.clone(),
            public_key_jwk: vm.public_key_jwk.clone(),
            public_key_pem: vm.public_key_pem.clone(),
            controller: controller_of(&vm.id).to_string(),
            purpose: purpose.to_string(),
        }
    }

    /// Decode the key material. When several encodings are present the
    /// first of PEM, multibase, JWK, hex wins.
    pub fn decode(&self) -> Result<PublicKey, IdentityError> {
        let key = if let Some(pem) = &self.public_key_pem {
            PublicKey::from_pem(pem)?
        } else if let Some(mb) = &self.public_key_multibase {
            PublicKey::from_multibase(mb)?
        } else if let Some(jwk) = &self.public_key_jwk {
            PublicKey::from_jwk(jwk)?
        } else if let Some(hex) = &self.public_key_hex {
            PublicKey::from_hex(hex)?
        } else {
            return Err(IdentityError::KeyNotFound(format!(
                "{} carries no key material",
                self.key_id
            )));
        };
        Ok(key)
    }

    pub fn to_cached(&self, organization_id: Option<String>) -> CachedPublicKey {
        let mut cached = CachedPublicKey::new(&self.key_id, &self.key_type);
        cached.public_key_multibase = self.public_key_multibase.clone();
        cached.public_key_hex = self.public_key_hex.clone();
        cached.public_key_jwk = self.public_key_jwk.clone();
        cached.public_key_pem = self.public_key_pem.clone();
        cached.purpose = self.purpose.clone();
        cached.organization_id = organization_id;
        cached
    }
}

impl From<&CachedPublicKey> for PublicKeyData {
    fn from(cached: &CachedPublicKey) -> Self {
        Self {
            key_id: cached.key_id.clone(),
            key_type: cached.key_type.clone(),
            algorithm: Self::algorithm_for(&cached.key_type),
            public_key_multibase: cached.public_key_multibase.clone(),
            public_key_hex: cached.public_key_hex.clone(),
            public_key_jwk: cached.public_key_jwk.clone(),
            public_key_pem: cached.public_key_pem.clone(),
            controller: cached.controller.clone(),
            purpose: cached.purpose.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_crypto::KeyPair;

    #[test]
    fn test_cached_roundtrip_keeps_material() {
        let mb = KeyPair::generate().public_key().to_multibase().unwrap();
        let cached = CachedPublicKey::new("did:web:a.com#k", "Ed25519VerificationKey2020")
            .with_multibase(&mb);
        let data = PublicKeyData::from(&cached);
        assert_eq!(data.algorithm, Some(SignatureAlgorithm::EdDSA));
        assert_eq!(data.decode().unwrap().family(), "Ed25519");
        let back = data.to_cached(Some("org".into()));
        assert_eq!(back.public_key_multibase, cached.public_key_multibase);
        assert_eq!(back.controller, "did:web:a.com");
    }

    #[test]
    fn test_multibase_preferred_over_hex() {
        let kp = KeyPair::generate();
        let cached = CachedPublicKey::new("did:web:a.com#k", "Multikey")
            .with_multibase(kp.public_key().to_multibase().unwrap())
            .with_hex("not-hex");
        assert!(PublicKeyData::from(&cached).decode().is_ok());
    }

    #[test]
    fn test_no_material() {
        let cached = CachedPublicKey::new("did:web:a.com#k", "Multikey");
        assert!(matches!(
            PublicKeyData::from(&cached).decode(),
            Err(IdentityError::KeyNotFound(_))
        ));
    }
}
