use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use veritas_core::constants::*;
use veritas_core::{CredentialFormat, VerificationResult, VerifierConfig};

use crate::ldp::LdpVerifier;
use crate::revocation::checker::PURPOSE_SUSPENSION;
use crate::revocation::{RevocationCheckResult, RevocationChecker};
use crate::validator::LdpValidator;

/// Verifies a single credential: validation, then proofs, then status.
pub struct CredentialsVerifier {
    validator: LdpValidator,
    ldp: Arc<LdpVerifier>,
    revocation: Arc<RevocationChecker>,
    timeout: Duration,
}

impl CredentialsVerifier {
    pub fn new(ldp: Arc<LdpVerifier>, revocation: Arc<RevocationChecker>, config: VerifierConfig) -> Self {
        Self {
            validator: LdpValidator::new(config.date_tolerance_ms),
            ldp,
            revocation,
            timeout: Duration::from_millis(config.verify_timeout_ms),
        }
    }

    /// Verify `credential` in the given format. Never fails: every outcome,
    /// including a timeout, is a `VerificationResult`.
    pub async fn verify(&self, credential: &str, format: CredentialFormat) -> VerificationResult {
        match tokio::time::timeout(self.timeout, self.verify_format(credential, format)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "credential verification timed out");
                VerificationResult::failure(
                    ERROR_MESSAGE_VERIFICATION_TIMEOUT,
                    ERROR_CODE_VERIFICATION_TIMEOUT,
                )
            }
        }
    }

    async fn verify_format(&self, credential: &str, format: CredentialFormat) -> VerificationResult {
        match format {
            CredentialFormat::LdpVc => self.verify_ldp(credential).await,
            CredentialFormat::MsoMdoc => {
                tracing::info!(format = %format, "format recognized but not verifiable offline");
                VerificationResult::failure(ERROR_MESSAGE_UNSUPPORTED_FORMAT, ERROR_CODE_UNSUPPORTED_FORMAT)
            }
        }
    }

    async fn verify_ldp(&self, credential: &str) -> VerificationResult {
        let validation = self.validator.validate(credential);
        if validation.is_fatal() {
            return VerificationResult::failure(validation.message, validation.error_code);
        }
        let vc: Value = match serde_json::from_str(credential) {
            Ok(vc) => vc,
            Err(e) => {
                return VerificationResult::failure(
                    format!("{}{}", EXCEPTION_DURING_VALIDATION, e),
                    ERROR_CODE_GENERIC,
                )
            }
        };

        if let Err(e) = self.ldp.verify(&vc).await {
            if e.is_offline() {
                tracing::info!(error = %e, "verification needs data that is not cached");
                return VerificationResult::offline_dependencies_missing();
            }
            tracing::debug!(error = %e, "credential proof rejected");
            return VerificationResult::signature_failed();
        }

        if let Some(status) = self.revocation.check(&vc).await {
            if !status.valid {
                return revocation_failure(&status).with_payload(vc);
            }
        }

        tracing::debug!(expired = validation.is_expired(), "credential verified");
        VerificationResult::success(validation.message, validation.error_code).with_payload(vc)
    }
}

fn revocation_failure(status: &RevocationCheckResult) -> VerificationResult {
    if let Some(code) = &status.error_code {
        let message = status
            .error_message
            .clone()
            .unwrap_or_else(|| revocation_message(code).to_string());
        return VerificationResult::failure(message, code.clone());
    }
    let code = if status.purpose == PURPOSE_SUSPENSION {
        ERROR_CODE_VC_SUSPENDED
    } else {
        ERROR_CODE_VC_REVOKED
    };
    let message = status.message.clone().unwrap_or_else(|| "Credential revoked".into());
    VerificationResult::failure(message, code)
}
