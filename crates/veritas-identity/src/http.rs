//! Outbound JSON fetches for online resolution.

use serde_json::Value;
use std::time::Duration;

use crate::error::IdentityError;

const ACCEPT_JSON_LD: &str = "application/ld+json, application/json";

/// Thin JSON-over-HTTP client shared by the resolvers and loaders.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// GET `url` and parse the body as JSON. Non-2xx statuses are errors.
    pub async fn get_json(&self, url: &str) -> Result<Value, IdentityError> {
        tracing::debug!(url = url, "fetching document");
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_JSON_LD)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(IdentityError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.json::<Value>().await?)
    }
}
