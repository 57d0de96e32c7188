use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde_json::{json, Value};

use veritas_core::constants::{ED25519_MULTICODEC, ED25519_SPKI_PREFIX, SECP256K1_MULTICODEC};

use crate::encoding::{
    base64_decode_lenient, base64url_decode, base64url_encode, multibase_decode,
    multibase_encode,
};
use crate::error::CryptoError;

/// Ed25519 key pair used to issue test fixtures and locally signed
/// presentations.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair using OS-provided entropy.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::Ed25519(self.signing_key.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

/// A verification key decoded from any of the encodings a DID document or
/// cached key record may carry.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Rsa(RsaPublicKey),
    Secp256k1(k256::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Short name of the key family, used in error messages.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => "Ed25519",
            Self::Rsa(_) => "RSA",
            Self::Secp256k1(_) => "secp256k1",
        }
    }

    pub fn ed25519_from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map(Self::Ed25519)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid Ed25519 key: {}", e)))
    }

    pub fn secp256k1_from_sec1(bytes: &[u8]) -> Result<Self, CryptoError> {
        k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map(Self::Secp256k1)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid secp256k1 key: {}", e)))
    }

    /// Decode a multibase key. Accepts multicodec-prefixed Ed25519 and
    /// secp256k1 keys, and bare 32-byte Ed25519 keys.
    pub fn from_multibase(value: &str) -> Result<Self, CryptoError> {
        let bytes = multibase_decode(value)?;
        if bytes.len() == 34 && bytes.starts_with(&ED25519_MULTICODEC) {
            return Self::ed25519_from_bytes(&bytes[2..]);
        }
        if bytes.len() == 35 && bytes.starts_with(&SECP256K1_MULTICODEC) {
            return Self::secp256k1_from_sec1(&bytes[2..]);
        }
        if bytes.len() == 32 {
            return Self::ed25519_from_bytes(&bytes);
        }
        Err(CryptoError::InvalidKey(format!(
            "unrecognized multibase key of {} bytes",
            bytes.len()
        )))
    }

    /// Decode a hex key: raw or SPKI Ed25519, SEC1 secp256k1, or RSA DER.
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        let trimmed = value.trim().trim_start_matches("0x");
        let bytes = hex::decode(trimmed)
            .map_err(|e| CryptoError::InvalidEncoding(format!("invalid hex: {}", e)))?;
        match bytes.len() {
            32 => Self::ed25519_from_bytes(&bytes),
            33 | 65 => Self::secp256k1_from_sec1(&bytes),
            _ => Self::from_der(&bytes),
        }
    }

    /// Decode a DER SubjectPublicKeyInfo or PKCS#1 RSA key.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        if der.len() == ED25519_SPKI_PREFIX.len() + 32 && der.starts_with(&ED25519_SPKI_PREFIX) {
            return Self::ed25519_from_bytes(&der[ED25519_SPKI_PREFIX.len()..]);
        }
        RsaPublicKey::from_public_key_der(der)
            .or_else(|_| RsaPublicKey::from_pkcs1_der(der))
            .map(Self::Rsa)
            .map_err(|e| CryptoError::InvalidKey(format!("unrecognized DER key: {}", e)))
    }

    /// Decode a PEM key (`PUBLIC KEY` or `RSA PUBLIC KEY`).
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let pem = pem.trim();
        if pem.contains("BEGIN RSA PUBLIC KEY") {
            return RsaPublicKey::from_pkcs1_pem(pem)
                .map(Self::Rsa)
                .map_err(|e| CryptoError::InvalidKey(format!("invalid PKCS#1 PEM: {}", e)));
        }
        if let Ok(rsa) = RsaPublicKey::from_public_key_pem(pem) {
            return Ok(Self::Rsa(rsa));
        }
        let body: String = pem
            .lines()
            .filter(|line| !line.trim_start().starts_with("-----"))
            .collect();
        Self::from_der(&base64_decode_lenient(&body)?)
    }

    /// Decode a public JWK (`OKP`/Ed25519, `RSA`, `EC`/secp256k1).
    pub fn from_jwk(jwk: &Value) -> Result<Self, CryptoError> {
        let field = |name: &str| -> Result<Vec<u8>, CryptoError> {
            let v = jwk
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| CryptoError::InvalidKey(format!("JWK missing '{}'", name)))?;
            base64url_decode(v)
        };
        let kty = jwk.get("kty").and_then(Value::as_str).unwrap_or_default();
        let crv = jwk.get("crv").and_then(Value::as_str).unwrap_or_default();
        match (kty, crv) {
            ("OKP", "Ed25519") => Self::ed25519_from_bytes(&field("x")?),
            ("RSA", _) => {
                let n = BigUint::from_bytes_be(&field("n")?);
                let e = BigUint::from_bytes_be(&field("e")?);
                RsaPublicKey::new(n, e)
                    .map(Self::Rsa)
                    .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA JWK: {}", e)))
            }
            ("EC", "secp256k1") => {
                let x = field("x")?;
                let y = field("y")?;
                let mut sec1 = Vec::with_capacity(65);
                sec1.push(0x04);
                sec1.extend_from_slice(&x);
                sec1.extend_from_slice(&y);
                Self::secp256k1_from_sec1(&sec1)
            }
            _ => Err(CryptoError::InvalidKey(format!(
                "unsupported JWK kty={} crv={}",
                kty, crv
            ))),
        }
    }

    /// Multicodec-prefixed base58btc encoding. RSA keys have no multikey
    /// form here and are rejected.
    pub fn to_multibase(&self) -> Result<String, CryptoError> {
        let mut bytes = Vec::new();
        match self {
            Self::Ed25519(key) => {
                bytes.extend_from_slice(&ED25519_MULTICODEC);
                bytes.extend_from_slice(key.as_bytes());
            }
            Self::Secp256k1(key) => {
                bytes.extend_from_slice(&SECP256K1_MULTICODEC);
                bytes.extend_from_slice(key.to_encoded_point(true).as_bytes());
            }
            Self::Rsa(_) => {
                return Err(CryptoError::InvalidKey(
                    "RSA keys have no multibase encoding".into(),
                ))
            }
        }
        Ok(multibase_encode(&bytes))
    }

    pub fn to_jwk(&self) -> Value {
        match self {
            Self::Ed25519(key) => json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "x": base64url_encode(key.as_bytes()),
            }),
            Self::Rsa(key) => json!({
                "kty": "RSA",
                "n": base64url_encode(&key.n().to_bytes_be()),
                "e": base64url_encode(&key.e().to_bytes_be()),
            }),
            Self::Secp256k1(key) => {
                let point = key.to_encoded_point(false);
                let coord = |c: Option<&k256::FieldBytes>| {
                    c.map(|b| base64url_encode(b.as_slice())).unwrap_or_default()
                };
                json!({
                    "kty": "EC",
                    "crv": "secp256k1",
                    "x": coord(point.x()),
                    "y": coord(point.y()),
                })
            }
        }
    }
}
