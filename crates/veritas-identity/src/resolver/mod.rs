//! Verification-method resolution, one strategy per DID method.

mod did_jwk;
mod did_key;
mod did_web;
mod https;

pub use did_jwk::DidJwkResolver;
pub use did_key::DidKeyResolver;
pub use did_web::DidWebResolver;
pub use https::HttpsKeyResolver;

use async_trait::async_trait;
use std::collections::HashMap;

use veritas_core::DidMethod;

use crate::error::IdentityError;
use crate::http::HttpFetcher;
use crate::key_data::PublicKeyData;

/// Trait for resolving a verification-method identifier to key material.
#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    async fn resolve(&self, verification_method: &str) -> Result<PublicKeyData, IdentityError>;
}

/// Fixed mapping from DID method to resolver, built once at startup.
pub struct ResolverRegistry {
    resolvers: HashMap<DidMethod, Box<dyn PublicKeyResolver>>,
}

impl ResolverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// The four standard strategies sharing one HTTP client.
    pub fn with_defaults(fetcher: HttpFetcher) -> Self {
        let mut registry = Self::new();
        registry.register(DidMethod::Web, Box::new(DidWebResolver::new(fetcher.clone())));
        registry.register(DidMethod::Key, Box::new(DidKeyResolver));
        registry.register(DidMethod::Jwk, Box::new(DidJwkResolver));
        registry.register(DidMethod::Https, Box::new(HttpsKeyResolver::new(fetcher)));
        registry
    }

    pub fn register(&mut self, method: DidMethod, resolver: Box<dyn PublicKeyResolver>) {
        self.resolvers.insert(method, resolver);
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    pub async fn resolve(&self, verification_method: &str) -> Result<PublicKeyData, IdentityError> {
        let method = DidMethod::from_identifier(verification_method)
            .map_err(|_| IdentityError::UnsupportedMethod(verification_method.to_string()))?;
        let resolver = self
            .resolvers
            .get(&method)
            .ok_or_else(|| IdentityError::UnsupportedMethod(method.to_string()))?;
        let key = resolver.resolve(verification_method).await?;
        tracing::debug!(
            method = %method,
            key_id = %key.key_id,
            key_type = %key.key_type,
            "verification method resolved"
        );
        Ok(key)
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
