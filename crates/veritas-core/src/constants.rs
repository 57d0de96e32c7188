//! Protocol constants: context URLs, field names, error codes and messages.

// --- JSON-LD contexts ---

/// VC Data Model 1.1 base context.
pub const CREDENTIALS_CONTEXT_V1_URL: &str = "https://www.w3.org/2018/credentials/v1";
/// VC Data Model 2.0 base context.
pub const CREDENTIALS_CONTEXT_V2_URL: &str = "https://www.w3.org/ns/credentials/v2";
pub const DID_CONTEXT_V1_URL: &str = "https://www.w3.org/ns/did/v1";
pub const SECURITY_CONTEXT_V2_URL: &str = "https://w3id.org/security/v2";
pub const ED25519_2020_CONTEXT_URL: &str = "https://w3id.org/security/suites/ed25519-2020/v1";

// --- Credential field names ---

pub const CONTEXT: &str = "@context";
pub const ID: &str = "id";
pub const TYPE: &str = "type";
pub const ISSUER: &str = "issuer";
pub const CREDENTIAL_SUBJECT: &str = "credentialSubject";
pub const PROOF: &str = "proof";
pub const JWS: &str = "jws";
pub const PROOF_VALUE: &str = "proofValue";
pub const ISSUANCE_DATE: &str = "issuanceDate";
pub const EXPIRATION_DATE: &str = "expirationDate";
pub const VALID_FROM: &str = "validFrom";
pub const VALID_UNTIL: &str = "validUntil";
pub const CREDENTIAL_STATUS: &str = "credentialStatus";
pub const EVIDENCE: &str = "evidence";
pub const TERMS_OF_USE: &str = "termsOfUse";
pub const REFRESH_SERVICE: &str = "refreshService";
pub const CREDENTIAL_SCHEMA: &str = "credentialSchema";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const LANGUAGE: &str = "language";
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";
pub const VERIFIABLE_CREDENTIAL_FIELD: &str = "verifiableCredential";

// --- Validation error codes ---

pub const ERROR_CODE_EMPTY_VC_JSON: &str = "ERR_EMPTY_VC";
pub const ERROR_CODE_MISSING: &str = "ERR_MISSING_";
pub const ERROR_CODE_INVALID: &str = "ERR_INVALID_";
pub const ERROR_CODE_GENERIC: &str = "ERR_GENERIC";
pub const ERROR_CODE_VC_EXPIRED: &str = "ERR_VC_EXPIRED";
pub const ERROR_CODE_CURRENT_DATE_BEFORE_ISSUANCE_DATE: &str = "ERR_ISSUANCE_DATE_IS_FUTURE_DATE";
pub const ERROR_CODE_CURRENT_DATE_BEFORE_VALID_FROM: &str = "ERR_VALID_FROM_IS_FUTURE_DATE";

// --- Validation error messages ---

pub const VALIDATION_ERROR: &str = "Validation Error: ";
pub const ERROR_MISSING_REQUIRED_FIELDS: &str = "Validation Error: Missing required field: ";
pub const ERROR_INVALID_URI: &str = "Validation Error: Invalid URI: ";
pub const ERROR_INVALID_FIELD: &str = "Validation Error: Invalid Field: ";
pub const EXCEPTION_DURING_VALIDATION: &str = "Exception during Validation: ";
pub const ERROR_MESSAGE_EMPTY_VC_JSON: &str =
    "Validation Error: Input VC JSON string is null or empty.";
pub const ERROR_MESSAGE_CONTEXT_FIRST_LINE: &str = "Validation Error: https://www.w3.org/2018/credentials/v1 or https://www.w3.org/ns/credentials/v2 needs to be first in the list of contexts.";
pub const ERROR_MESSAGE_TYPE_VERIFIABLE_CREDENTIAL: &str =
    "Validation Error: type must include `VerifiableCredential`.";
pub const ERROR_MESSAGE_ALGORITHM_NOT_SUPPORTED: &str =
    "Validation Error: Algorithm used in the proof is not matching with supported algorithms";
pub const ERROR_MESSAGE_PROOF_TYPE_NOT_SUPPORTED: &str =
    "Validation Error: Proof Type is not matching with supported types";
pub const ERROR_CREDENTIAL_SUBJECT_NON_NULL_OBJECT: &str =
    "credentialSubject must be a non-null object or array of objects.";
pub const ERROR_ISSUANCE_DATE_INVALID: &str = "Validation Error: issuanceDate is not valid.";
pub const ERROR_EXPIRATION_DATE_INVALID: &str = "Validation Error: expirationDate is not valid.";
pub const ERROR_VALID_FROM_INVALID: &str = "Validation Error: validFrom is not valid.";
pub const ERROR_VALID_UNTIL_INVALID: &str = "Validation Error: validUntil is not valid.";
pub const ERROR_MESSAGE_VC_EXPIRED: &str = "VC is expired";
pub const ERROR_CURRENT_DATE_BEFORE_ISSUANCE_DATE: &str =
    "Validation Error: The current date time is before the issuanceDate";
pub const ERROR_CURRENT_DATE_BEFORE_VALID_FROM: &str =
    "Validation Error: The current date time is before the validFrom Date";
pub const ERROR_MESSAGE_NAME: &str =
    "Validation Error: name should be string or array of Language Object";
pub const ERROR_MESSAGE_DESCRIPTION: &str =
    "Validation Error: description should be string or array of Language Object";

// --- Verification codes and messages ---

pub const ERROR_CODE_VERIFICATION_FAILED: &str = "ERR_SIGNATURE_VERIFICATION_FAILED";
pub const ERROR_MESSAGE_VERIFICATION_FAILED: &str = "Verification Failed";
pub const ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING: &str = "ERR_OFFLINE_DEPENDENCIES_MISSING";
pub const ERROR_MESSAGE_OFFLINE_DEPENDENCIES_MISSING: &str = "Required verification data not available offline. Connect to the internet to seed the cache and try again.";
pub const ERROR_CODE_VC_REVOKED: &str = "ERR_VC_REVOKED";
pub const ERROR_CODE_VC_SUSPENDED: &str = "ERR_VC_SUSPENDED";
pub const ERROR_CODE_UNSUPPORTED_FORMAT: &str = "ERR_UNSUPPORTED_FORMAT";
pub const ERROR_MESSAGE_UNSUPPORTED_FORMAT: &str =
    "Credential format is recognized but cannot be verified offline";
pub const ERROR_CODE_VERIFICATION_TIMEOUT: &str = "ERR_VERIFICATION_TIMEOUT";
pub const ERROR_MESSAGE_VERIFICATION_TIMEOUT: &str = "Verification did not complete in time";

// --- Revocation ---

pub const STATUS_RETRIEVAL_ERROR: &str = "STATUS_RETRIEVAL_ERROR";
pub const STATUS_VERIFICATION_ERROR: &str = "STATUS_VERIFICATION_ERROR";
pub const STATUS_LIST_LENGTH_ERROR: &str = "STATUS_LIST_LENGTH_ERROR";
pub const RANGE_ERROR: &str = "RANGE_ERROR";
/// Minimum decoded status-list length in bits (herd privacy).
pub const BITSTRING_MIN_ENTRIES: usize = 131_072;
pub const BITSTRING_STATUS_ENTRY_TYPE: &str = "BitstringStatusListEntry";
pub const BITSTRING_STATUS_VC_TYPE: &str = "BitstringStatusListCredential";

/// Human-readable message for a revocation error code.
pub fn revocation_message(code: &str) -> &'static str {
    match code {
        STATUS_RETRIEVAL_ERROR => "Failed to retrieve status list credential",
        STATUS_LIST_LENGTH_ERROR => "Status list length below minimum herd privacy threshold",
        RANGE_ERROR => "Credential status index out of range",
        _ => "Failed to verify status list credential",
    }
}

// --- Key encodings ---

/// DER prefix of an Ed25519 SubjectPublicKeyInfo; the raw 32-byte key follows.
pub const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];
/// Multicodec header for an Ed25519 public key.
pub const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];
/// Multicodec header for a compressed secp256k1 public key.
pub const SECP256K1_MULTICODEC: [u8; 2] = [0xe7, 0x01];
/// PSS salt length used by PS256 signers.
pub const PSS_SALT_LEN: usize = 32;
/// Default tolerance applied to date comparisons.
pub const DATE_TOLERANCE_MS: i64 = 3000;
