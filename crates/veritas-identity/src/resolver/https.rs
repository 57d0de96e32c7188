use async_trait::async_trait;
use serde_json::Value;

use veritas_cache::records::controller_of;

use super::PublicKeyResolver;
use crate::error::IdentityError;
use crate::http::HttpFetcher;
use crate::key_data::PublicKeyData;

/// Bare `https:` key identifiers: the URL serves the key document itself.
pub struct HttpsKeyResolver {
    fetcher: HttpFetcher,
}

impl HttpsKeyResolver {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

/// First string field among `names`.
fn string_field(doc: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| doc.get(*n).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl PublicKeyResolver for HttpsKeyResolver {
    async fn resolve(&self, verification_method: &str) -> Result<PublicKeyData, IdentityError> {
        let doc = self.fetcher.get_json(verification_method).await?;
        let key_type = string_field(&doc, &["type", "key_type"]).unwrap_or_default();
        let key = PublicKeyData {
            key_id: verification_method.to_string(),
            algorithm: None,
            public_key_pem: string_field(&doc, &["publicKeyPem", "public_key_pem"]),
            public_key_multibase: string_field(&doc, &["publicKeyMultibase", "public_key_multibase"]),
            public_key_jwk: doc
                .get("publicKeyJwk")
                .or_else(|| doc.get("public_key_jwk"))
                .cloned(),
            public_key_hex: string_field(&doc, &["publicKeyHex", "public_key_hex"]),
            controller: controller_of(verification_method).to_string(),
            purpose: "assertion".into(),
            key_type,
        };
        let algorithm = key
            .key_type
            .parse::<veritas_core::KeyType>()
            .ok()
            .and_then(|kt| kt.default_algorithm());
        Ok(PublicKeyData { algorithm, ..key })
    }
}
