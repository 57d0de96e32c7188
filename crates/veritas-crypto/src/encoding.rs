//! Multibase and base64url helpers.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::CryptoError;

/// Decode a multibase string. Supports base58btc (`z`), base64url (`u`),
/// base64 (`m`) and lowercase hex (`f`).
pub fn multibase_decode(value: &str) -> Result<Vec<u8>, CryptoError> {
    let mut chars = value.chars();
    let prefix = chars
        .next()
        .ok_or_else(|| CryptoError::InvalidEncoding("empty multibase string".into()))?;
    let body = chars.as_str();
    match prefix {
        'z' => bs58::decode(body)
            .into_vec()
            .map_err(|e| CryptoError::InvalidEncoding(format!("invalid base58: {}", e))),
        'u' => base64url_decode(body),
        'm' => STANDARD_NO_PAD
            .decode(body.trim_end_matches('='))
            .map_err(|e| CryptoError::InvalidEncoding(format!("invalid base64: {}", e))),
        'f' => hex::decode(body)
            .map_err(|e| CryptoError::InvalidEncoding(format!("invalid hex: {}", e))),
        other => Err(CryptoError::InvalidEncoding(format!(
            "unsupported multibase prefix '{}'",
            other
        ))),
    }
}

/// Encode as base58btc multibase (`z` prefix).
pub fn multibase_encode(bytes: &[u8]) -> String {
    format!("z{}", bs58::encode(bytes).into_string())
}

/// Decode base64url, tolerating trailing padding.
pub fn base64url_decode(value: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| CryptoError::InvalidEncoding(format!("invalid base64url: {}", e)))
}

pub fn base64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode standard base64, ignoring embedded whitespace (PEM bodies).
pub fn base64_decode_lenient(value: &str) -> Result<Vec<u8>, CryptoError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| CryptoError::InvalidEncoding(format!("invalid base64: {}", e)))
}
