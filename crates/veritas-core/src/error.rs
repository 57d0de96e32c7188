/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unsupported credential format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported proof type: {0}")]
    UnsupportedProofType(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("unsupported DID method: {0}")]
    UnsupportedMethod(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}
