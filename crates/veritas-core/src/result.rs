//! Verification outcomes returned to callers.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING, ERROR_CODE_VC_EXPIRED,
    ERROR_CODE_VERIFICATION_FAILED, ERROR_MESSAGE_OFFLINE_DEPENDENCIES_MISSING,
    ERROR_MESSAGE_VERIFICATION_FAILED,
};

/// Result of verifying a single credential.
///
/// `status == true` may still carry the expired code: expiry is reported as
/// metadata unless the signature itself failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub status: bool,
    pub message: String,
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl VerificationResult {
    pub fn success(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
            error_code: error_code.into(),
            payload: None,
        }
    }

    pub fn failure(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            error_code: error_code.into(),
            payload: None,
        }
    }

    /// The generic signature failure. Never carries cryptographic detail.
    pub fn signature_failed() -> Self {
        Self::failure(
            ERROR_MESSAGE_VERIFICATION_FAILED,
            ERROR_CODE_VERIFICATION_FAILED,
        )
    }

    pub fn offline_dependencies_missing() -> Self {
        Self::failure(
            ERROR_MESSAGE_OFFLINE_DEPENDENCIES_MISSING,
            ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING,
        )
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.error_code == ERROR_CODE_VC_EXPIRED
    }

    /// Collapse into the per-credential status used in presentation results.
    pub fn vc_status(&self) -> VcStatus {
        match (self.status, self.is_expired()) {
            (_, true) => VcStatus::Expired,
            (true, false) => VcStatus::Success,
            (false, false) => VcStatus::Invalid,
        }
    }
}

/// Outcome of the pre-signature structural and temporal checks.
/// Empty message and code mean the credential passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    pub message: String,
    pub error_code: String,
}

impl ValidationStatus {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn new(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: error_code.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.message.is_empty() && self.error_code.is_empty()
    }

    pub fn is_expired(&self) -> bool {
        self.error_code == ERROR_CODE_VC_EXPIRED
    }

    /// A failure that must stop verification before the signature check.
    pub fn is_fatal(&self) -> bool {
        !self.is_ok() && !self.is_expired()
    }
}

/// Status of a presentation's own proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
    Valid,
    Expired,
    Invalid,
}

impl ProofStatus {
    /// Per-credential status to fall back on when a credential cannot be
    /// checked individually.
    pub fn as_vc_status(&self) -> VcStatus {
        match self {
            Self::Valid => VcStatus::Success,
            Self::Expired => VcStatus::Expired,
            Self::Invalid => VcStatus::Invalid,
        }
    }
}

/// Status of one credential inside a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VcStatus {
    Success,
    Expired,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcResult {
    pub vc_id: String,
    pub status: VcStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationVerificationResult {
    pub proof_status: ProofStatus,
    pub vc_results: Vec<VcResult>,
}
