use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{CREDENTIALS_CONTEXT_V1_URL, CREDENTIALS_CONTEXT_V2_URL};
use crate::error::CoreError;

/// Wire format of a credential handed to the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialFormat {
    /// JSON-LD credential secured with a linked-data proof.
    #[serde(rename = "ldp_vc")]
    LdpVc,
    /// ISO 18013-5 mobile document.
    #[serde(rename = "mso_mdoc")]
    MsoMdoc,
}

impl CredentialFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LdpVc => "ldp_vc",
            Self::MsoMdoc => "mso_mdoc",
        }
    }
}

impl Default for CredentialFormat {
    fn default() -> Self {
        Self::LdpVc
    }
}

impl FromStr for CredentialFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ldp_vc" => Ok(Self::LdpVc),
            "mso_mdoc" => Ok(Self::MsoMdoc),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Linked-data proof suites accepted on credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofType {
    RsaSignature2018,
    Ed25519Signature2018,
    Ed25519Signature2020,
    EcdsaSecp256k1Signature2019,
    JsonWebSignature2020,
    DataIntegrityProof,
}

impl ProofType {
    pub const ALL: [ProofType; 6] = [
        Self::RsaSignature2018,
        Self::Ed25519Signature2018,
        Self::Ed25519Signature2020,
        Self::EcdsaSecp256k1Signature2019,
        Self::JsonWebSignature2020,
        Self::DataIntegrityProof,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaSignature2018 => "RsaSignature2018",
            Self::Ed25519Signature2018 => "Ed25519Signature2018",
            Self::Ed25519Signature2020 => "Ed25519Signature2020",
            Self::EcdsaSecp256k1Signature2019 => "EcdsaSecp256k1Signature2019",
            Self::JsonWebSignature2020 => "JsonWebSignature2020",
            Self::DataIntegrityProof => "DataIntegrityProof",
        }
    }

    /// Whether the suite carries its signature as a detached JWS.
    pub fn uses_jws(&self) -> bool {
        !matches!(self, Self::Ed25519Signature2020 | Self::DataIntegrityProof)
    }
}

impl FromStr for ProofType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnsupportedProofType(s.to_string()))
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JWS algorithms accepted in detached proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    PS256,
    RS256,
    EdDSA,
    ES256K,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PS256 => "PS256",
            Self::RS256 => "RS256",
            Self::EdDSA => "EdDSA",
            Self::ES256K => "ES256K",
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PS256" => Ok(Self::PS256),
            "RS256" => Ok(Self::RS256),
            "EdDSA" => Ok(Self::EdDSA),
            "ES256K" => Ok(Self::ES256K),
            other => Err(CoreError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verification-method key types understood by the resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519VerificationKey2018,
    Ed25519VerificationKey2020,
    RsaVerificationKey2018,
    EcdsaSecp256k1VerificationKey2019,
    JsonWebKey2020,
    Multikey,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519VerificationKey2018 => "Ed25519VerificationKey2018",
            Self::Ed25519VerificationKey2020 => "Ed25519VerificationKey2020",
            Self::RsaVerificationKey2018 => "RsaVerificationKey2018",
            Self::EcdsaSecp256k1VerificationKey2019 => "EcdsaSecp256k1VerificationKey2019",
            Self::JsonWebKey2020 => "JsonWebKey2020",
            Self::Multikey => "Multikey",
        }
    }

    /// The algorithm implied by the key type, if it names one.
    pub fn default_algorithm(&self) -> Option<SignatureAlgorithm> {
        match self {
            Self::Ed25519VerificationKey2018 | Self::Ed25519VerificationKey2020 => {
                Some(SignatureAlgorithm::EdDSA)
            }
            Self::RsaVerificationKey2018 => Some(SignatureAlgorithm::RS256),
            Self::EcdsaSecp256k1VerificationKey2019 => Some(SignatureAlgorithm::ES256K),
            Self::JsonWebKey2020 | Self::Multikey => None,
        }
    }
}

impl FromStr for KeyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ed25519VerificationKey2018" => Ok(Self::Ed25519VerificationKey2018),
            "Ed25519VerificationKey2020" => Ok(Self::Ed25519VerificationKey2020),
            "RsaVerificationKey2018" => Ok(Self::RsaVerificationKey2018),
            "EcdsaSecp256k1VerificationKey2019" => Ok(Self::EcdsaSecp256k1VerificationKey2019),
            "JsonWebKey2020" => Ok(Self::JsonWebKey2020),
            "Multikey" => Ok(Self::Multikey),
            other => Err(CoreError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier schemes a verification method can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DidMethod {
    Web,
    Key,
    Jwk,
    Https,
}

impl DidMethod {
    /// Classify a verification-method identifier by its prefix.
    pub fn from_identifier(identifier: &str) -> Result<Self, CoreError> {
        if identifier.starts_with("did:web:") {
            Ok(Self::Web)
        } else if identifier.starts_with("did:key:") {
            Ok(Self::Key)
        } else if identifier.starts_with("did:jwk:") {
            Ok(Self::Jwk)
        } else if identifier.starts_with("https:") {
            Ok(Self::Https)
        } else {
            Err(CoreError::UnsupportedMethod(identifier.to_string()))
        }
    }

    /// `did:key` and `did:jwk` carry their key material inline.
    pub fn requires_network(&self) -> bool {
        matches!(self, Self::Web | Self::Https)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "did:web",
            Self::Key => "did:key",
            Self::Jwk => "did:jwk",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for DidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// VC data model version, chosen by the first `@context` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataModel {
    V1_1,
    V2_0,
    Unsupported,
}

impl DataModel {
    /// Returns `None` when the credential has no `@context` at all.
    pub fn detect(credential: &serde_json::Value) -> Option<Self> {
        let context = credential.get(crate::constants::CONTEXT)?;
        let first = match context {
            serde_json::Value::Array(items) => items.first(),
            other => Some(other),
        };
        Some(match first.and_then(|v| v.as_str()) {
            Some(CREDENTIALS_CONTEXT_V1_URL) => Self::V1_1,
            Some(CREDENTIALS_CONTEXT_V2_URL) => Self::V2_0,
            _ => Self::Unsupported,
        })
    }
}
