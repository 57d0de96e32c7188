//! Veritas Core — Fundamental types, errors, and constants shared by the
//! offline credential verifier and its cache-sync engine.

pub mod config;
pub mod connectivity;
pub mod constants;
pub mod error;
pub mod result;
pub mod types;

pub use config::VerifierConfig;
pub use connectivity::{Connectivity, FixedConnectivity};
pub use error::CoreError;
pub use result::{
    PresentationVerificationResult, ProofStatus, ValidationStatus, VcResult, VcStatus,
    VerificationResult,
};
pub use types::{
    CredentialFormat, DataModel, DidMethod, KeyType, ProofType, SignatureAlgorithm,
};
