//! Compressed status bitstrings: one-character multibase prefix, then a
//! gzip stream of the raw bits.

use flate2::read::GzDecoder;
use std::io::Read;

use veritas_core::constants::{RANGE_ERROR, STATUS_VERIFICATION_ERROR};
use veritas_crypto::encoding::{base64url_decode, multibase_decode};

use crate::error::CredentialError;

/// Decode and decompress an `encodedList` value.
///
/// `z` is base58btc and `u` base64url. A value with neither prefix is tried
/// as bare base64url.
pub fn expand(encoded: &str) -> Result<Vec<u8>, CredentialError> {
    if encoded.is_empty() {
        return Err(CredentialError::revocation(
            STATUS_VERIFICATION_ERROR,
            "encoded status list missing",
        ));
    }
    let compressed = match encoded.chars().next() {
        Some('z') | Some('u') => multibase_decode(encoded),
        _ => base64url_decode(encoded),
    }
    .map_err(|e| {
        tracing::debug!(error = %e, "status list multibase decode failed");
        CredentialError::revocation(
            STATUS_VERIFICATION_ERROR,
            "invalid multibase encoding for status list",
        )
    })?;

    let mut expanded = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut expanded)
        .map_err(|e| {
            CredentialError::revocation(
                STATUS_VERIFICATION_ERROR,
                format!("status list decompression failed: {}", e),
            )
        })?;
    tracing::debug!(bytes = expanded.len(), "status list expanded");
    Ok(expanded)
}

/// Read bit `index`, most significant bit of each byte first.
pub fn status_bit(bits: &[u8], index: usize) -> Result<u8, CredentialError> {
    let byte = bits.get(index / 8).ok_or_else(|| {
        CredentialError::revocation(RANGE_ERROR, "status index outside range of status list")
    })?;
    Ok((byte >> (7 - index % 8)) & 0x01)
}
