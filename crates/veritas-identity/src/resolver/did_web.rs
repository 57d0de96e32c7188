use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::PublicKeyResolver;
use crate::document::DidDocument;
use crate::error::IdentityError;
use crate::http::HttpFetcher;
use crate::key_data::PublicKeyData;

fn did_web_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^did:web:([a-zA-Z0-9.%-]+)(?::(.+))?$").ok())
        .as_ref()
}

/// `did:web`: fetch the DID document from the domain named by the DID.
pub struct DidWebResolver {
    fetcher: HttpFetcher,
    scheme: String,
}

impl DidWebResolver {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            scheme: "https".into(),
        }
    }

    /// Override the URL scheme. Only meaningful against local test hosts.
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// `did:web:example.com:orgs:acme` → `https://example.com/orgs/acme/did.json`;
    /// no path → `https://example.com/.well-known/did.json`.
    pub fn document_url(&self, did: &str) -> Result<String, IdentityError> {
        let did = did.split('#').next().unwrap_or_default();
        let caps = did_web_pattern()
            .and_then(|re| re.captures(did))
            .ok_or_else(|| IdentityError::InvalidDid(did.to_string()))?;
        let domain = caps
            .get(1)
            .map(|m| m.as_str().replace("%3A", ":").replace("%3a", ":"))
            .unwrap_or_default();
        let url = match caps.get(2) {
            Some(path) => format!(
                "{}://{}/{}/did.json",
                self.scheme,
                domain,
                path.as_str().replace(':', "/")
            ),
            None => format!("{}://{}/.well-known/did.json", self.scheme, domain),
        };
        url::Url::parse(&url).map_err(|e| IdentityError::InvalidDid(format!("{}: {}", did, e)))?;
        Ok(url)
    }
}

#[async_trait]
impl PublicKeyResolver for DidWebResolver {
    async fn resolve(&self, verification_method: &str) -> Result<PublicKeyData, IdentityError> {
        let url = self.document_url(verification_method)?;
        let doc: DidDocument = serde_json::from_value(self.fetcher.get_json(&url).await?)?;
        let vm = doc
            .find_method(verification_method)
            .ok_or_else(|| IdentityError::KeyNotFound(verification_method.to_string()))?;
        let purpose = doc.purpose_of(&vm.id);
        Ok(PublicKeyData::from_verification_method(&vm, purpose))
    }
}
