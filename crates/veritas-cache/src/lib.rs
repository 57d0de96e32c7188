//! Veritas Cache — the organization-scoped local store the verifier reads
//! from and the sync engine replaces into.

pub mod error;
pub mod records;
pub mod store;

pub use error::CacheError;
pub use records::{
    CacheRecord, CachedContext, CachedPublicKey, CachedRevokedVc, CachedStatusList, Category,
    ContextSource,
};
pub use store::{LocalCacheStore, SCHEMA_VERSION};
