//! Veritas Credentials — offline credential and presentation verification.
//!
//! - `LdpValidator`: structural checks for Data Model 1.1 and 2.0 credentials
//! - `LdpVerifier`: linked-data proof verification against cached keys and contexts
//! - `RevocationChecker`: cached revocation records and bitstring status lists
//! - `CredentialsVerifier` / `PresentationVerifier`: the public entry points
//! - `CacheManager`: seeding and organization-scoped replacement of the cache

pub mod cache_manager;
pub mod dates;
pub mod error;
pub mod ldp;
pub mod presentation;
pub mod revocation;
pub mod validator;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use cache_manager::{CacheBundle, CacheManager, ContextEntry, ItemsUpdated, PrimedFromVc};
pub use error::CredentialError;
pub use ldp::LdpVerifier;
pub use presentation::{PresentationOptions, PresentationVerifier};
pub use revocation::{RevocationCheckResult, RevocationChecker, StatusListLoader};
pub use validator::LdpValidator;
pub use verifier::CredentialsVerifier;
