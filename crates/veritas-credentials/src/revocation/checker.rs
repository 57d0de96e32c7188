use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use veritas_cache::LocalCacheStore;
use veritas_core::constants::{
    BITSTRING_STATUS_ENTRY_TYPE, CREDENTIAL_STATUS, ID, STATUS_LIST_LENGTH_ERROR,
    STATUS_VERIFICATION_ERROR,
};

use super::bitstring::{expand, status_bit};
use super::loader::{normalize_purposes, StatusListLoader};
use crate::error::CredentialError;
use crate::ldp::LdpVerifier;
use crate::validator::LdpValidator;

pub const PURPOSE_REVOCATION: &str = "revocation";
pub const PURPOSE_SUSPENSION: &str = "suspension";
pub const PURPOSE_REFRESH: &str = "refresh";
pub const PURPOSE_MESSAGE: &str = "message";
pub const PURPOSE_UNKNOWN: &str = "unknown";

/// Outcome of a status check. `status` is the raw bit (1 = set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationCheckResult {
    pub valid: bool,
    pub status: u8,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RevocationCheckResult {
    fn evaluated(status: u8, purpose: &str) -> Self {
        let (valid, message) = match (status, purpose) {
            (0, _) => (true, None),
            (_, PURPOSE_REVOCATION) => (false, Some("Credential revoked")),
            (_, PURPOSE_SUSPENSION) => (false, Some("Credential suspended")),
            (_, PURPOSE_REFRESH) => (true, Some("Updated credential available (refresh)")),
            (_, PURPOSE_MESSAGE) => (true, Some("Status message present")),
            _ => (false, Some("Credential status bit set (treated as revoked)")),
        };
        Self {
            valid,
            status,
            purpose: purpose.to_string(),
            message: message.map(str::to_string),
            error_code: None,
            error_message: None,
        }
    }

    fn revoked_record() -> Self {
        Self::evaluated(1, PURPOSE_REVOCATION)
    }

    fn error(code: &str, message: String) -> Self {
        Self {
            valid: false,
            status: 1,
            purpose: PURPOSE_UNKNOWN.into(),
            message: None,
            error_code: Some(code.to_string()),
            error_message: Some(message),
        }
    }
}

/// The fields of a bitstring status entry the checker needs.
struct StatusEntry {
    list_url: String,
    index: usize,
    purposes: Vec<String>,
}

fn is_bitstring_entry(entry: &Value) -> bool {
    let typed = match entry.get("type") {
        Some(Value::String(t)) => t == BITSTRING_STATUS_ENTRY_TYPE,
        Some(Value::Array(types)) => types.iter().any(|t| t == BITSTRING_STATUS_ENTRY_TYPE),
        _ => false,
    };
    typed || entry.get("statusListIndex").is_some()
}

fn first_field<'a>(entry: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| entry.get(*name))
        .find(|v| !v.is_null() && v.as_str() != Some(""))
}

fn parse_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

impl StatusEntry {
    fn parse(entry: &Value) -> Result<Self, CredentialError> {
        let url = first_field(
            entry,
            &["statusListCredential", "status_list_credential", "statusList", ID],
        )
        .and_then(Value::as_str);
        let index = first_field(
            entry,
            &["statusListIndex", "status_list_index", "statusListEntry", "statusListPosition"],
        );
        let (Some(url), Some(index)) = (url, index) else {
            return Err(CredentialError::revocation(
                STATUS_VERIFICATION_ERROR,
                "Missing status list credential URL or index",
            ));
        };
        let index = parse_index(index).ok_or_else(|| {
            CredentialError::revocation(STATUS_VERIFICATION_ERROR, "Invalid status list index")
        })?;
        Ok(Self {
            list_url: url.to_string(),
            index,
            purposes: normalize_purposes(first_field(entry, &["statusPurpose", "status_purpose"])),
        })
    }
}

/// Evaluates a credential's status against cached revocation records and
/// its bitstring status list.
pub struct RevocationChecker {
    store: Arc<LocalCacheStore>,
    loader: StatusListLoader,
    ldp: Arc<LdpVerifier>,
    validator: LdpValidator,
    min_bits: usize,
}

impl RevocationChecker {
    pub fn new(
        store: Arc<LocalCacheStore>,
        loader: StatusListLoader,
        ldp: Arc<LdpVerifier>,
        validator: LdpValidator,
        min_bits: usize,
    ) -> Self {
        Self {
            store,
            loader,
            ldp,
            validator,
            min_bits,
        }
    }

    /// `None` when the credential is not revoked by record and declares no
    /// bitstring status entry. Failures are folded into an invalid result.
    pub async fn check(&self, credential: &Value) -> Option<RevocationCheckResult> {
        match self.evaluate(credential).await {
            Ok(result) => result,
            Err(CredentialError::Revocation { code, message }) => {
                tracing::warn!(code = code, error = %message, "revocation check failed");
                Some(RevocationCheckResult::error(code, message))
            }
            Err(e) => {
                tracing::error!(error = %e, "unexpected revocation check failure");
                Some(RevocationCheckResult::error(STATUS_VERIFICATION_ERROR, e.to_string()))
            }
        }
    }

    async fn evaluate(&self, credential: &Value) -> Result<Option<RevocationCheckResult>, CredentialError> {
        if let Some(vc_id) = credential.get(ID).and_then(Value::as_str) {
            if let Some(record) = self.store.is_revoked(vc_id)? {
                tracing::info!(vc_id = vc_id, issuer = %record.issuer, "credential listed as revoked");
                return Ok(Some(RevocationCheckResult::revoked_record()));
            }
        }

        let entry = match credential.get(CREDENTIAL_STATUS) {
            Some(Value::Array(entries)) => entries.iter().find(|e| is_bitstring_entry(e)),
            Some(entry) if is_bitstring_entry(entry) => Some(entry),
            _ => None,
        };
        let Some(entry) = entry else {
            return Ok(None);
        };
        let entry = StatusEntry::parse(entry)?;
        tracing::debug!(url = %entry.list_url, index = entry.index, "checking bitstring status");

        let list = self.loader.load(&entry.list_url).await?;
        let encoded = list.encoded_list.clone().ok_or_else(|| {
            CredentialError::revocation(
                STATUS_VERIFICATION_ERROR,
                "Status list credential missing encodedList",
            )
        })?;
        self.verify_list(&list.raw).await?;

        let overlap: Vec<&String> = entry
            .purposes
            .iter()
            .filter(|p| list.purposes.contains(p))
            .collect();
        if !entry.purposes.is_empty() && !list.purposes.is_empty() && overlap.is_empty() {
            return Err(CredentialError::revocation(
                STATUS_VERIFICATION_ERROR,
                format!(
                    "Status purpose mismatch (no overlap) entry={} list={}",
                    entry.purposes.join(","),
                    list.purposes.join(",")
                ),
            ));
        }
        let purpose = overlap
            .first()
            .copied()
            .or_else(|| entry.purposes.first())
            .or_else(|| list.purposes.first())
            .map(String::as_str)
            .unwrap_or(PURPOSE_UNKNOWN);

        let bits = expand(&encoded)?;
        if bits.len() * 8 < self.min_bits {
            return Err(CredentialError::revocation(
                STATUS_LIST_LENGTH_ERROR,
                "Expanded status list below minimum herd privacy length",
            ));
        }
        let bit = status_bit(&bits, entry.index)?;
        tracing::debug!(index = entry.index, bit = bit, purpose = purpose, "status bit evaluated");
        Ok(Some(RevocationCheckResult::evaluated(bit, purpose)))
    }

    /// A status list is itself a signed credential and is only trusted once
    /// it validates and its proof verifies.
    async fn verify_list(&self, raw: &Value) -> Result<(), CredentialError> {
        let status = self.validator.validate_value(raw, Utc::now());
        if !status.is_ok() {
            tracing::warn!(code = %status.error_code, "status list credential failed validation");
            return Err(CredentialError::revocation(
                STATUS_VERIFICATION_ERROR,
                "Unable to verify status list credential proof",
            ));
        }
        self.ldp.verify(raw).await.map_err(|e| {
            tracing::warn!(error = %e, "status list proof verification failed");
            CredentialError::revocation(
                STATUS_VERIFICATION_ERROR,
                "Unable to verify status list credential proof",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, TestEnv, STATUS_LIST_URL};
    use serde_json::json;
    use veritas_cache::{CachedRevokedVc, CachedStatusList};
    use veritas_core::constants::{RANGE_ERROR, STATUS_RETRIEVAL_ERROR};
    use veritas_crypto::KeyPair;

    fn credential_with_status(index: Value, purpose: &str) -> Value {
        json!({
            "id": "https://issuer.example/credentials/42",
            "credentialStatus": {
                "id": format!("{}#{}", STATUS_LIST_URL, index),
                "type": "BitstringStatusListEntry",
                "statusPurpose": purpose,
                "statusListIndex": index,
                "statusListCredential": STATUS_LIST_URL
            }
        })
    }

    fn seeded(bits: &[usize], purpose: &str, total_bits: usize) -> TestEnv {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let list = testing::status_list_credential(bits, total_bits, purpose, &kp, &vm);
        env.store
            .put(CachedStatusList::from_credential(STATUS_LIST_URL, list))
            .unwrap();
        env
    }

    #[tokio::test]
    async fn test_no_status_entry_is_none() {
        let env = TestEnv::new(false);
        let vc = json!({"id": "https://issuer.example/credentials/1"});
        assert!(env.revocation_checker().check(&vc).await.is_none());
    }

    #[tokio::test]
    async fn test_revoked_record_short_circuits() {
        let env = TestEnv::new(false);
        env.store
            .put(CachedRevokedVc::new("https://issuer.example/credentials/42", "did:web:issuer.example"))
            .unwrap();
        let vc = json!({"id": "https://issuer.example/credentials/42"});
        let result = env.revocation_checker().check(&vc).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.purpose, "revocation");
        assert_eq!(result.message.as_deref(), Some("Credential revoked"));
    }

    #[tokio::test]
    async fn test_bit_set_revokes() {
        let env = seeded(&[5, 77], "revocation", testing::MIN_LIST_BITS);
        let checker = env.revocation_checker();
        let revoked = checker.check(&credential_with_status(json!(77), "revocation")).await.unwrap();
        assert!(!revoked.valid);
        assert_eq!(revoked.status, 1);

        let clear = checker.check(&credential_with_status(json!("6"), "revocation")).await.unwrap();
        assert!(clear.valid);
        assert_eq!(clear.status, 0);
    }

    #[tokio::test]
    async fn test_purpose_classification() {
        let env = seeded(&[3], "suspension", testing::MIN_LIST_BITS);
        let r = env
            .revocation_checker()
            .check(&credential_with_status(json!(3), "suspension"))
            .await
            .unwrap();
        assert!(!r.valid);
        assert_eq!(r.message.as_deref(), Some("Credential suspended"));

        let env = seeded(&[3], "refresh", testing::MIN_LIST_BITS);
        let r = env
            .revocation_checker()
            .check(&credential_with_status(json!(3), "refresh"))
            .await
            .unwrap();
        assert!(r.valid);
        assert_eq!(r.status, 1);
    }

    #[tokio::test]
    async fn test_purpose_mismatch() {
        let env = seeded(&[3], "suspension", testing::MIN_LIST_BITS);
        let r = env
            .revocation_checker()
            .check(&credential_with_status(json!(3), "revocation"))
            .await
            .unwrap();
        assert!(!r.valid);
        assert_eq!(r.purpose, "unknown");
        assert_eq!(r.error_code.as_deref(), Some(STATUS_VERIFICATION_ERROR));
    }

    #[tokio::test]
    async fn test_short_list_is_length_error_regardless_of_bit() {
        let env = seeded(&[], "revocation", 8 * 1024);
        let r = env
            .revocation_checker()
            .check(&credential_with_status(json!(0), "revocation"))
            .await
            .unwrap();
        assert!(!r.valid);
        assert_eq!(r.error_code.as_deref(), Some(STATUS_LIST_LENGTH_ERROR));
    }

    #[tokio::test]
    async fn test_index_beyond_list_is_range_error() {
        let env = seeded(&[], "revocation", testing::MIN_LIST_BITS);
        let r = env
            .revocation_checker()
            .check(&credential_with_status(json!(testing::MIN_LIST_BITS + 1), "revocation"))
            .await
            .unwrap();
        assert_eq!(r.error_code.as_deref(), Some(RANGE_ERROR));
    }

    #[tokio::test]
    async fn test_invalid_index_and_missing_url() {
        let env = seeded(&[], "revocation", testing::MIN_LIST_BITS);
        let checker = env.revocation_checker();
        let r = checker.check(&credential_with_status(json!(-1), "revocation")).await.unwrap();
        assert_eq!(r.error_code.as_deref(), Some(STATUS_VERIFICATION_ERROR));

        let vc = json!({"credentialStatus": {"type": "BitstringStatusListEntry", "statusListIndex": "4"}});
        let r = checker.check(&vc).await.unwrap();
        assert_eq!(r.error_code.as_deref(), Some(STATUS_VERIFICATION_ERROR));
    }

    #[tokio::test]
    async fn test_tampered_list_is_verification_error() {
        let env = TestEnv::new(false);
        let kp = KeyPair::generate();
        let vm = env.seed_ed25519_key(&kp, "did:web:issuer.example#key-1");
        let mut list = testing::status_list_credential(&[], testing::MIN_LIST_BITS, "revocation", &kp, &vm);
        list["credentialSubject"]["encodedList"] = json!(testing::encoded_list(&[9], testing::MIN_LIST_BITS));
        env.store
            .put(CachedStatusList::from_credential(STATUS_LIST_URL, list))
            .unwrap();
        let r = env
            .revocation_checker()
            .check(&credential_with_status(json!(9), "revocation"))
            .await
            .unwrap();
        assert!(!r.valid);
        assert_eq!(r.error_code.as_deref(), Some(STATUS_VERIFICATION_ERROR));
    }

    #[tokio::test]
    async fn test_uncached_list_offline_is_retrieval_error() {
        let env = TestEnv::new(false);
        let r = env
            .revocation_checker()
            .check(&credential_with_status(json!(1), "revocation"))
            .await
            .unwrap();
        assert_eq!(r.error_code.as_deref(), Some(STATUS_RETRIEVAL_ERROR));
    }

    #[tokio::test]
    async fn test_status_array_with_other_entry_types() {
        let env = seeded(&[2], "revocation", testing::MIN_LIST_BITS);
        let vc = json!({
            "credentialStatus": [
                {"id": "https://other.example/1", "type": "RevocationList2020Status"},
                {"type": ["BitstringStatusListEntry"], "status_list_credential": STATUS_LIST_URL,
                 "status_list_index": 2, "status_purpose": ["revocation"]}
            ]
        });
        let r = env.revocation_checker().check(&vc).await.unwrap();
        assert!(!r.valid);
    }
}
