use veritas_cache::CacheError;
use veritas_crypto::CryptoError;

/// Identity-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// A key, context or document is not cached and the network may not
    /// (or could not) be used to fetch it.
    #[error("offline dependency missing: {0}")]
    OfflineDependencyMissing(String),

    #[error("unsupported DID method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("verification method not found: {0}")]
    KeyNotFound(String),

    #[error("fetch of {url} failed with HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("http error: {0}")]
    Http(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IdentityError {
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::OfflineDependencyMissing(_))
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
