//! Structural and temporal checks run on a linked-data credential before
//! any signature work.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use veritas_core::constants::*;
use veritas_core::{DataModel, ProofType, SignatureAlgorithm, ValidationStatus};
use veritas_crypto::jws::header_algorithm;

use crate::dates;

/// Fields present on every data model that must exist.
const COMMON_MANDATORY_FIELDS: [&str; 5] = [CONTEXT, TYPE, CREDENTIAL_SUBJECT, ISSUER, PROOF];

/// Fields that, when present, must be objects (or arrays of objects)
/// carrying a `type`.
const FIELDS_WITH_ID_AND_TYPE: [&str; 6] = [
    PROOF,
    CREDENTIAL_STATUS,
    EVIDENCE,
    CREDENTIAL_SCHEMA,
    REFRESH_SERVICE,
    TERMS_OF_USE,
];

const V1_ID_MANDATORY_FIELDS: [&str; 3] = [CREDENTIAL_STATUS, REFRESH_SERVICE, CREDENTIAL_SCHEMA];
const V2_ID_MANDATORY_FIELDS: [&str; 1] = [CREDENTIAL_SCHEMA];

type Check = Result<(), ValidationStatus>;

fn fail(message: impl Into<String>, code: impl Into<String>) -> Check {
    Err(ValidationStatus::new(message, code))
}

fn missing(field: &str) -> ValidationStatus {
    ValidationStatus::new(
        format!("{}{}", ERROR_MISSING_REQUIRED_FIELDS, field),
        format!("{}{}", ERROR_CODE_MISSING, field.replace('.', "_").to_uppercase()),
    )
}

fn invalid_code(field: &str) -> String {
    format!("{}{}", ERROR_CODE_INVALID, field.to_uppercase())
}

/// Accepts `did:` identifiers, absolute URLs with a host, and any other
/// scheme-qualified string.
pub fn is_valid_uri(value: &str) -> bool {
    if value.starts_with("did:") {
        return true;
    }
    match url::Url::parse(value) {
        Ok(url) => url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => value.contains(':'),
    }
}

/// Validator for `ldp_vc` credentials (data model 1.1 and 2.0).
#[derive(Debug, Clone)]
pub struct LdpValidator {
    tolerance_ms: i64,
}

impl Default for LdpValidator {
    fn default() -> Self {
        Self::new(DATE_TOLERANCE_MS)
    }
}

impl LdpValidator {
    pub fn new(tolerance_ms: i64) -> Self {
        Self { tolerance_ms }
    }

    /// Validate a credential string.
    ///
    /// An empty status means the credential passed. An expired credential
    /// yields `ERR_VC_EXPIRED`, which callers treat as non-fatal.
    pub fn validate(&self, credential: &str) -> ValidationStatus {
        self.validate_at(credential, Utc::now())
    }

    pub fn validate_at(&self, credential: &str, now: DateTime<Utc>) -> ValidationStatus {
        if credential.trim().is_empty() {
            return ValidationStatus::new(ERROR_MESSAGE_EMPTY_VC_JSON, ERROR_CODE_EMPTY_VC_JSON);
        }
        let vc: Value = match serde_json::from_str(credential) {
            Ok(v) => v,
            Err(e) => {
                return ValidationStatus::new(
                    format!("{}{}", EXCEPTION_DURING_VALIDATION, e),
                    ERROR_CODE_GENERIC,
                )
            }
        };
        self.validate_value(&vc, now)
    }

    pub fn validate_value(&self, vc: &Value, now: DateTime<Utc>) -> ValidationStatus {
        let Some(obj) = vc.as_object() else {
            return ValidationStatus::new(
                format!("{}credential is not a JSON object", EXCEPTION_DURING_VALIDATION),
                ERROR_CODE_GENERIC,
            );
        };
        let Some(model) = DataModel::detect(vc) else {
            return missing(CONTEXT);
        };
        let outcome = match model {
            DataModel::V1_1 => self.validate_v1(obj, now),
            DataModel::V2_0 => self.validate_v2(obj, now),
            DataModel::Unsupported => {
                return ValidationStatus::new(ERROR_MESSAGE_CONTEXT_FIRST_LINE, invalid_code(CONTEXT))
            }
        };
        match outcome {
            Ok(status) => status,
            Err(status) => {
                tracing::debug!(code = %status.error_code, "credential failed validation");
                status
            }
        }
    }

    fn validate_v1(&self, vc: &Map<String, Value>, now: DateTime<Utc>) -> Result<ValidationStatus, ValidationStatus> {
        check_mandatory(vc, &COMMON_MANDATORY_FIELDS)?;
        check_mandatory(vc, &[ISSUANCE_DATE])?;
        check_date_formats(
            vc,
            &[
                (ISSUANCE_DATE, ERROR_ISSUANCE_DATE_INVALID),
                (EXPIRATION_DATE, ERROR_EXPIRATION_DATE_INVALID),
            ],
        )?;
        if let Some(issued) = vc.get(ISSUANCE_DATE).and_then(Value::as_str) {
            if dates::is_future(issued, self.tolerance_ms, now) {
                fail(
                    ERROR_CURRENT_DATE_BEFORE_ISSUANCE_DATE,
                    ERROR_CODE_CURRENT_DATE_BEFORE_ISSUANCE_DATE,
                )?;
            }
        }
        check_id_and_type_fields(vc, &V1_ID_MANDATORY_FIELDS)?;
        check_common_fields(vc)?;
        Ok(self.expiry_status(vc.get(EXPIRATION_DATE), now))
    }

    fn validate_v2(&self, vc: &Map<String, Value>, now: DateTime<Utc>) -> Result<ValidationStatus, ValidationStatus> {
        check_mandatory(vc, &COMMON_MANDATORY_FIELDS)?;
        check_date_formats(
            vc,
            &[
                (VALID_FROM, ERROR_VALID_FROM_INVALID),
                (VALID_UNTIL, ERROR_VALID_UNTIL_INVALID),
            ],
        )?;
        if let Some(from) = vc.get(VALID_FROM).and_then(Value::as_str) {
            if dates::is_future(from, self.tolerance_ms, now) {
                fail(
                    ERROR_CURRENT_DATE_BEFORE_VALID_FROM,
                    ERROR_CODE_CURRENT_DATE_BEFORE_VALID_FROM,
                )?;
            }
        }
        check_id_and_type_fields(vc, &V2_ID_MANDATORY_FIELDS)?;
        check_language_field(vc, NAME, ERROR_MESSAGE_NAME)?;
        check_language_field(vc, DESCRIPTION, ERROR_MESSAGE_DESCRIPTION)?;
        check_common_fields(vc)?;
        Ok(self.expiry_status(vc.get(VALID_UNTIL), now))
    }

    fn expiry_status(&self, expiry: Option<&Value>, now: DateTime<Utc>) -> ValidationStatus {
        let expired = expiry
            .and_then(Value::as_str)
            .is_some_and(|date| dates::is_expired(date, self.tolerance_ms, now));
        if expired {
            ValidationStatus::new(ERROR_MESSAGE_VC_EXPIRED, ERROR_CODE_VC_EXPIRED)
        } else {
            ValidationStatus::ok()
        }
    }
}

fn check_mandatory(vc: &Map<String, Value>, fields: &[&str]) -> Check {
    for field in fields {
        if !vc.contains_key(*field) {
            return Err(missing(field));
        }
    }
    Ok(())
}

fn check_date_formats(vc: &Map<String, Value>, fields: &[(&str, &str)]) -> Check {
    for (field, message) in fields {
        if let Some(value) = vc.get(*field) {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !dates::is_valid_date(&text) {
                fail(*message, invalid_code(field))?;
            }
        }
    }
    Ok(())
}

fn check_id_and_type_fields(vc: &Map<String, Value>, id_mandatory: &[&str]) -> Check {
    for field in FIELDS_WITH_ID_AND_TYPE {
        if let Some(value) = vc.get(field) {
            let id_required = id_mandatory.contains(&field);
            check_object_or_array(
                field,
                value,
                &format!("{}{}", ERROR_INVALID_FIELD, field),
                |item| check_single_object(field, item, id_required),
            )?;
        }
    }
    Ok(())
}

/// `value` must be an object, or an array whose items are all objects;
/// `check` runs on each object.
fn check_object_or_array<F>(field: &str, value: &Value, message: &str, check: F) -> Check
where
    F: Fn(&Map<String, Value>) -> Check,
{
    match value {
        Value::Array(items) => {
            for item in items {
                match item.as_object() {
                    Some(obj) => check(obj)?,
                    None => fail(message, invalid_code(field))?,
                }
            }
            Ok(())
        }
        Value::Object(obj) => check(obj),
        _ => fail(message, invalid_code(field)),
    }
}

fn check_single_object(field: &str, obj: &Map<String, Value>, id_required: bool) -> Check {
    if !obj.contains_key(TYPE) {
        return Err(missing(&format!("{}.{}", field, TYPE)));
    }
    match obj.get(ID) {
        None if id_required => Err(missing(&format!("{}.{}", field, ID))),
        Some(Value::String(id)) if !id.is_empty() && !is_valid_uri(id) => fail(
            format!("{}{}.{}", ERROR_INVALID_URI, field, ID),
            format!("{}{}_{}", ERROR_CODE_INVALID, field.to_uppercase(), ID.to_uppercase()),
        ),
        _ => Ok(()),
    }
}

fn check_language_field(vc: &Map<String, Value>, field: &str, message: &str) -> Check {
    match vc.get(field) {
        None | Some(Value::String(_)) => Ok(()),
        Some(Value::Array(items))
            if items
                .iter()
                .all(|item| item.as_object().is_some_and(|o| o.contains_key(LANGUAGE))) =>
        {
            Ok(())
        }
        Some(_) => fail(message, invalid_code(field)),
    }
}

fn check_common_fields(vc: &Map<String, Value>) -> Check {
    check_credential_subject(vc)?;
    check_proof(vc)?;
    check_id(vc)?;
    check_type(vc)?;
    check_issuer(vc)
}

fn check_credential_subject(vc: &Map<String, Value>) -> Check {
    let subject = vc.get(CREDENTIAL_SUBJECT).unwrap_or(&Value::Null);
    check_object_or_array(
        CREDENTIAL_SUBJECT,
        subject,
        ERROR_CREDENTIAL_SUBJECT_NON_NULL_OBJECT,
        |obj| match obj.get(ID).and_then(Value::as_str) {
            Some(id) if !is_valid_uri(id) => fail(
                format!("{}{}.{}", ERROR_INVALID_URI, CREDENTIAL_SUBJECT, ID),
                format!("{}{}ID", ERROR_CODE_INVALID, CREDENTIAL_SUBJECT),
            ),
            _ => Ok(()),
        },
    )
}

fn check_proof(vc: &Map<String, Value>) -> Check {
    match vc.get(PROOF) {
        None | Some(Value::Null) => Err(missing(PROOF)),
        Some(Value::Array(proofs)) => proofs.iter().try_for_each(check_single_proof),
        Some(proof) => check_single_proof(proof),
    }
}

fn check_single_proof(proof: &Value) -> Check {
    let algorithm_error = || {
        fail(
            ERROR_MESSAGE_ALGORITHM_NOT_SUPPORTED,
            format!("{}ALGORITHM", ERROR_CODE_INVALID),
        )
    };
    if let Some(jws) = proof.get(JWS).filter(|v| !v.is_null()) {
        let alg = jws.as_str().and_then(header_algorithm);
        match alg {
            Some(alg) if alg.parse::<SignatureAlgorithm>().is_ok() => {}
            _ => algorithm_error()?,
        }
    }
    let supported = proof
        .get(TYPE)
        .and_then(Value::as_str)
        .is_some_and(|t| t.parse::<ProofType>().is_ok());
    if !supported {
        fail(
            ERROR_MESSAGE_PROOF_TYPE_NOT_SUPPORTED,
            format!("{}PROOF_TYPE", ERROR_CODE_INVALID),
        )?;
    }
    Ok(())
}

fn check_id(vc: &Map<String, Value>) -> Check {
    match vc.get(ID) {
        Some(id) if !id.as_str().is_some_and(is_valid_uri) => fail(
            format!("{}{}", ERROR_INVALID_URI, ID),
            format!("{}{}", ERROR_CODE_INVALID, ID),
        ),
        _ => Ok(()),
    }
}

fn check_type(vc: &Map<String, Value>) -> Check {
    let has_vc_type = match vc.get(TYPE) {
        Some(Value::Array(types)) => types.iter().any(|t| t == VERIFIABLE_CREDENTIAL),
        Some(Value::String(t)) => t == VERIFIABLE_CREDENTIAL,
        _ => false,
    };
    if has_vc_type {
        Ok(())
    } else {
        fail(ERROR_MESSAGE_TYPE_VERIFIABLE_CREDENTIAL, invalid_code(TYPE))
    }
}

fn check_issuer(vc: &Map<String, Value>) -> Check {
    let issuer_id = match vc.get(ISSUER) {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Object(obj)) => obj.get(ID).and_then(Value::as_str),
        _ => None,
    };
    if issuer_id.is_some_and(is_valid_uri) {
        Ok(())
    } else {
        fail(format!("{}{}", ERROR_INVALID_URI, ISSUER), invalid_code(ISSUER))
    }
}
