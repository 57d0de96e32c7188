pub mod init;
pub mod status;
pub mod sync;
pub mod verify;
pub mod verify_presentation;

use serde::Deserialize;

/// Where `veritas-node` listens by default.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9101";

#[derive(Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

/// Read a JSON document given inline or as a path to a file.
pub(crate) fn read_document(arg: &str) -> anyhow::Result<serde_json::Value> {
    // Try reading as file first, then as inline JSON
    let json_str = if std::path::Path::new(arg).exists() {
        std::fs::read_to_string(arg)?
    } else {
        arg.to_string()
    };
    serde_json::from_str(&json_str).map_err(|e| anyhow::anyhow!("invalid JSON: {}", e))
}

/// Turn a non-success response into an error carrying the node's message.
pub(crate) async fn bail_on_error(what: &str, resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if let Ok(err) = resp.json::<ErrorResponse>().await {
        anyhow::bail!("{} failed (HTTP {}): {}", what, status, err.error);
    }
    anyhow::bail!("{} failed (HTTP {})", what, status)
}
