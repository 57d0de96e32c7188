//! Detached JWS (`<header>..<signature>`) as used by the 2018-era
//! linked-data suites. The payload is never transmitted: the signing input
//! is `header_b64 + "." + payload` with the payload left unencoded.

use serde::{Deserialize, Serialize};

use veritas_core::SignatureAlgorithm;

use crate::encoding::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::keys::PublicKey;
use crate::signing::verify;

/// Protected JWS header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JwsHeader {
    /// The unencoded-payload header used by linked-data JWS proofs.
    pub fn detached(alg: SignatureAlgorithm) -> Self {
        Self {
            alg: alg.to_string(),
            b64: Some(false),
            crit: Some(vec!["b64".into()]),
            kid: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetachedJws {
    header_b64: String,
    pub header: JwsHeader,
    pub signature: Vec<u8>,
}

impl DetachedJws {
    pub fn parse(jws: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = jws.split('.').collect();
        if parts.len() != 3 {
            return Err(CryptoError::MalformedJws(format!(
                "expected 3 segments, got {}",
                parts.len()
            )));
        }
        if !parts[1].is_empty() {
            return Err(CryptoError::MalformedJws("payload segment must be empty".into()));
        }
        let header_bytes = base64url_decode(parts[0])?;
        let header: JwsHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| CryptoError::MalformedJws(format!("invalid header: {}", e)))?;
        let signature = base64url_decode(parts[2])?;
        Ok(Self {
            header_b64: parts[0].to_string(),
            header,
            signature,
        })
    }

    pub fn algorithm(&self) -> Result<SignatureAlgorithm, CryptoError> {
        self.header
            .alg
            .parse()
            .map_err(|_| CryptoError::UnsupportedAlgorithm(self.header.alg.clone()))
    }

    pub fn signing_input(&self, payload: &[u8]) -> Vec<u8> {
        signing_input(&self.header_b64, payload)
    }

    pub fn verify(&self, key: &PublicKey, payload: &[u8]) -> Result<(), CryptoError> {
        let alg = self.algorithm()?;
        verify(key, alg, &self.signing_input(payload), &self.signature)
    }
}

fn signing_input(header_b64: &str, payload: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(header_b64.len() + 1 + payload.len());
    input.extend_from_slice(header_b64.as_bytes());
    input.push(b'.');
    input.extend_from_slice(payload);
    input
}

/// The `alg` named in a JWS header, without validating the rest.
pub fn header_algorithm(jws: &str) -> Option<String> {
    let header_b64 = jws.split('.').next()?;
    let bytes = base64url_decode(header_b64).ok()?;
    let header: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    header.get("alg")?.as_str().map(str::to_string)
}

/// Produce a detached JWS over `payload`. `signer` receives the signing
/// input and returns raw signature bytes.
pub fn encode_detached<F>(header: &JwsHeader, payload: &[u8], signer: F) -> Result<String, CryptoError>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, CryptoError>,
{
    let header_json = serde_json::to_vec(header)
        .map_err(|e| CryptoError::SigningError(format!("header encoding: {}", e)))?;
    let header_b64 = base64url_encode(&header_json);
    let signature = signer(&signing_input(&header_b64, payload))?;
    Ok(format!("{}..{}", header_b64, base64url_encode(&signature)))
}
