use veritas_cache::CacheError;
use veritas_core::CoreError;
use veritas_crypto::CryptoError;
use veritas_identity::IdentityError;

/// Credential verification errors.
///
/// These never reach callers of the public `verify` entry points directly;
/// they are folded into `VerificationResult`s there.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("offline dependency missing: {0}")]
    OfflineDependencyMissing(String),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("unsupported proof: {0}")]
    UnsupportedProof(String),

    #[error("no challenge available for presentation proof")]
    MissingChallenge,

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("{code}: {message}")]
    Revocation { code: &'static str, message: String },

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CredentialError {
    /// Whether the failure is a missing key, context or status list that
    /// reconnecting would fix.
    pub fn is_offline(&self) -> bool {
        match self {
            Self::OfflineDependencyMissing(_) => true,
            Self::Identity(e) => e.is_offline(),
            _ => false,
        }
    }

    pub(crate) fn revocation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Revocation {
            code,
            message: message.into(),
        }
    }
}
