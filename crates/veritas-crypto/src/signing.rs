use ed25519_dalek::Signer;
use ed25519_dalek::Verifier;
use rsa::{Pkcs1v15Sign, Pss};
use sha2::{Digest, Sha256};

use veritas_core::constants::PSS_SALT_LEN;
use veritas_core::SignatureAlgorithm;

use crate::encoding::multibase_encode;
use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

/// Ed25519 signature (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    inner: ed25519_dalek::Signature,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.inner.to_bytes()
    }

    /// Base58btc multibase form, as carried in `proofValue`.
    pub fn to_multibase(&self) -> String {
        multibase_encode(&self.to_bytes())
    }
}

/// Sign a message using Ed25519.
pub fn sign(message: &[u8], keypair: &KeyPair) -> Signature {
    Signature {
        inner: keypair.signing_key().sign(message),
    }
}

/// Verify `signature` over `message` with `key` under `alg`.
///
/// The key family must match the algorithm. secp256k1 signatures with a
/// high S value are normalized before verification.
pub fn verify(
    key: &PublicKey,
    alg: SignatureAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let result = match (alg, key) {
        (SignatureAlgorithm::EdDSA, PublicKey::Ed25519(vk)) => {
            let sig = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| CryptoError::SignatureVerificationFailed)?;
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
        (SignatureAlgorithm::RS256, PublicKey::Rsa(pk)) => {
            let digest = Sha256::digest(message);
            pk.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
        (SignatureAlgorithm::PS256, PublicKey::Rsa(pk)) => {
            let digest = Sha256::digest(message);
            pk.verify(Pss::new_with_salt::<Sha256>(PSS_SALT_LEN), &digest, signature)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
        (SignatureAlgorithm::ES256K, PublicKey::Secp256k1(vk)) => {
            use k256::ecdsa::signature::Verifier as _;
            let sig = k256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| CryptoError::SignatureVerificationFailed)?;
            let sig = sig.normalize_s().unwrap_or(sig);
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
        (alg, key) => Err(CryptoError::KeyAlgorithmMismatch {
            alg: alg.to_string(),
            key: key.family(),
        }),
    };
    if let Err(e) = &result {
        tracing::debug!(alg = %alg, key = key.family(), error = %e, "signature check failed");
    }
    result
}
