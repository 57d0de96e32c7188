//! Veritas Identity Layer
//!
//! Resolves verification-method identifiers to key material and JSON-LD
//! context URLs to documents, reading the local cache first:
//! - `did:web`, `did:key`, `did:jwk` and `https:` key resolvers
//! - a registry dispatching identifiers to resolvers by method
//! - `PublicKeyService`, the cache-first entry point used by verifiers
//! - `OfflineDocumentLoader` for `@context` and DID URLs

pub mod document;
pub mod error;
pub mod http;
pub mod key_data;
pub mod loader;
pub mod resolver;
pub mod service;

pub use document::{DidDocument, VerificationMethod};
pub use error::IdentityError;
pub use http::HttpFetcher;
pub use key_data::PublicKeyData;
pub use loader::OfflineDocumentLoader;
pub use resolver::{
    DidJwkResolver, DidKeyResolver, DidWebResolver, HttpsKeyResolver, PublicKeyResolver,
    ResolverRegistry,
};
pub use service::PublicKeyService;
