//! `veritas verify` — Verify a verifiable credential against the node's cache.

use clap::Args;
use serde::Serialize;

use veritas_core::{CredentialFormat, VerificationResult};

use super::{bail_on_error, read_document, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Credential JSON (as string or path to file).
    #[arg(short, long)]
    pub credential: String,

    /// Credential format (ldp_vc, mso_mdoc).
    #[arg(short, long, default_value = "ldp_vc")]
    pub format: CredentialFormat,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Serialize)]
struct VerifyRequest {
    credential: serde_json::Value,
    format: CredentialFormat,
}

pub(crate) fn describe(result: &VerificationResult) -> &'static str {
    if !result.status {
        "INVALID"
    } else if result.is_expired() {
        "VALID (expired)"
    } else {
        "VALID"
    }
}

pub async fn run(args: &VerifyArgs) -> anyhow::Result<()> {
    let credential = read_document(&args.credential)?;

    let url = format!("{}/api/v1/verify", args.endpoint);
    let body = VerifyRequest {
        credential,
        format: args.format,
    };

    let client = reqwest::Client::new();
    let resp = match client.post(&url).json(&body).send().await {
        Ok(r) => r,
        Err(e) => {
            println!("Could not reach node at {}", args.endpoint);
            println!("  Error: {}", e);
            return Ok(());
        }
    };

    let result: VerificationResult = bail_on_error("verification", resp).await?.json().await?;
    println!("Credential is {}", describe(&result));
    if !result.error_code.is_empty() {
        println!("  Code:    {}", result.error_code);
    }
    if !result.message.is_empty() {
        println!("  Message: {}", result.message);
    }
    Ok(())
}
