use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use veritas_core::constants::{ID, VERIFIABLE_CREDENTIAL_FIELD};
use veritas_core::{
    CredentialFormat, PresentationVerificationResult, ProofStatus, ProofType, VcResult,
};
use veritas_identity::document::controller_document;
use veritas_identity::{DidDocument, PublicKeyData};

use crate::dates;
use crate::error::CredentialError;
use crate::ldp::{proofs, verification_method, LdpVerifier};
use crate::verifier::CredentialsVerifier;

const AUTHENTICATION_PURPOSE: &str = "authentication";

/// Binding options for a presentation proof.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationOptions {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub unsigned_presentation: bool,
}

/// Verifies a presentation's own `Ed25519Signature2020` proof and every
/// credential it carries.
pub struct PresentationVerifier {
    ldp: Arc<LdpVerifier>,
    credentials: Arc<CredentialsVerifier>,
}

impl PresentationVerifier {
    pub fn new(ldp: Arc<LdpVerifier>, credentials: Arc<CredentialsVerifier>) -> Self {
        Self { ldp, credentials }
    }

    /// Errors only for unusable input: unparsable JSON, no challenge to
    /// bind a signed presentation to, or key material that is not cached
    /// while offline.
    pub async fn verify(
        &self,
        presentation: &str,
        options: &PresentationOptions,
    ) -> Result<PresentationVerificationResult, CredentialError> {
        let vp: Value = serde_json::from_str(presentation)
            .map_err(|e| CredentialError::Malformed(format!("unsupported VP token: {}", e)))?;

        let proof_status = self.verify_presentation_proof(&vp, options).await?;
        tracing::info!(proof_status = ?proof_status, "presentation proof evaluated");

        let mut vc_results = Vec::new();
        for credential in embedded_credentials(&vp) {
            let (vc_id, text) = match credential {
                Value::String(s) => (s.clone(), s.clone()),
                other => {
                    let text = other.to_string();
                    let id = other.get(ID).and_then(Value::as_str).map(str::to_string);
                    (id.unwrap_or_else(|| text.clone()), text)
                }
            };
            let result = self.credentials.verify(&text, CredentialFormat::LdpVc).await;
            vc_results.push(VcResult {
                vc_id,
                status: result.vc_status(),
            });
        }
        Ok(PresentationVerificationResult {
            proof_status,
            vc_results,
        })
    }

    async fn verify_presentation_proof(
        &self,
        vp: &Value,
        options: &PresentationOptions,
    ) -> Result<ProofStatus, CredentialError> {
        let all = proofs(vp);
        if all.is_empty() {
            if options.unsigned_presentation {
                return Ok(ProofStatus::Valid);
            }
            tracing::warn!("presentation carries no proof");
            return Ok(ProofStatus::Invalid);
        }
        let supported: Vec<&Value> = all
            .into_iter()
            .filter(|p| p.get("type").and_then(Value::as_str) == Some(ProofType::Ed25519Signature2020.as_str()))
            .collect();
        if supported.is_empty() {
            tracing::warn!("presentation has no Ed25519Signature2020 proof");
            return Ok(ProofStatus::Invalid);
        }

        self.ldp.preflight_contexts(vp).await?;

        let mut status = ProofStatus::Invalid;
        for proof in supported {
            match self.verify_single(vp, proof, options).await {
                Ok(ProofStatus::Valid) => return Ok(ProofStatus::Valid),
                Ok(ProofStatus::Expired) => status = ProofStatus::Expired,
                Ok(ProofStatus::Invalid) => {}
                Err(e) if e.is_offline() => return Err(e),
                Err(CredentialError::MissingChallenge) => return Err(CredentialError::MissingChallenge),
                Err(e) => {
                    tracing::debug!(error = %e, "presentation proof rejected");
                    if e.to_string().to_lowercase().contains("expired") {
                        status = ProofStatus::Expired;
                    }
                }
            }
        }
        Ok(status)
    }

    async fn verify_single(
        &self,
        vp: &Value,
        proof: &Value,
        options: &PresentationOptions,
    ) -> Result<ProofStatus, CredentialError> {
        let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);

        let challenge = options
            .challenge
            .clone()
            .or_else(|| text(proof, "challenge"))
            .or_else(|| text(vp, "challenge"));
        match &challenge {
            None if !options.unsigned_presentation => return Err(CredentialError::MissingChallenge),
            Some(expected) if text(proof, "challenge").as_ref() != Some(expected) => {
                tracing::warn!("presentation challenge does not match");
                return Ok(ProofStatus::Invalid);
            }
            _ => {}
        }
        if let Some(domain) = &options.domain {
            if text(proof, "domain").as_ref() != Some(domain) {
                tracing::warn!(domain = %domain, "presentation domain does not match");
                return Ok(ProofStatus::Invalid);
            }
        }
        if let Some(expires) = text(proof, "expires") {
            if dates::is_expired(&expires, 0, Utc::now()) {
                return Ok(ProofStatus::Expired);
            }
        }

        if text(proof, "proofPurpose").as_deref() != Some(AUTHENTICATION_PURPOSE) {
            tracing::warn!("presentation proof purpose is not authentication");
            return Ok(ProofStatus::Invalid);
        }

        let method = verification_method(proof)
            .ok_or_else(|| CredentialError::InvalidProof("proof has no verificationMethod".into()))?;
        let key = self.ldp.verify_proof(vp, proof).await?;
        if !authenticates(&key, method)? {
            tracing::warn!(key_id = %key.key_id, "key is not an authentication method of its controller");
            return Ok(ProofStatus::Invalid);
        }
        Ok(ProofStatus::Valid)
    }
}

/// The proof's method must be listed under `authentication` of the
/// controller document built from the cached key, so none is fetched.
/// A bare DID stands for the key it resolved to.
fn authenticates(key: &PublicKeyData, method: &str) -> Result<bool, CredentialError> {
    let document: DidDocument = serde_json::from_value(controller_document(
        &key.controller,
        std::slice::from_ref(key),
    ))?;
    let id = if method.contains('#') {
        method
    } else if method == document.id {
        key.key_id.as_str()
    } else {
        return Ok(false);
    };
    Ok(document.is_authentication_method(id))
}

fn embedded_credentials(vp: &Value) -> Vec<&Value> {
    match vp.get(VERIFIABLE_CREDENTIAL_FIELD) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}
