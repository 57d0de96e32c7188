use serde::{Deserialize, Serialize};

use crate::constants::{BITSTRING_MIN_ENTRIES, DATE_TOLERANCE_MS};

/// Tunables shared by the credential and presentation verifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Clock skew allowed when comparing credential dates, in milliseconds.
    #[serde(default = "default_date_tolerance_ms")]
    pub date_tolerance_ms: i64,
    /// Upper bound on a single `verify` call, in milliseconds.
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,
    /// Timeout for outbound HTTP fetches made while online.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Minimum decoded status-list length, in bits.
    #[serde(default = "default_status_list_min_bits")]
    pub status_list_min_bits: usize,
}

fn default_date_tolerance_ms() -> i64 {
    DATE_TOLERANCE_MS
}
fn default_verify_timeout_ms() -> u64 {
    30_000
}
fn default_http_timeout_ms() -> u64 {
    10_000
}
fn default_status_list_min_bits() -> usize {
    BITSTRING_MIN_ENTRIES
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            date_tolerance_ms: default_date_tolerance_ms(),
            verify_timeout_ms: default_verify_timeout_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            status_list_min_bits: default_status_list_min_bits(),
        }
    }
}
