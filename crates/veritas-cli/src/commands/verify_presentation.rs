//! `veritas verify-presentation` — Verify a presentation and the credentials
//! it carries.

use clap::Args;
use serde::Serialize;

use veritas_core::{PresentationVerificationResult, ProofStatus, VcStatus};

use super::{bail_on_error, read_document, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct VerifyPresentationArgs {
    /// Presentation JSON (as string or path to file).
    #[arg(short, long)]
    pub presentation: String,

    /// Expected challenge; defaults to the one in the proof.
    #[arg(long)]
    pub challenge: Option<String>,

    /// Expected domain.
    #[arg(long)]
    pub domain: Option<String>,

    /// Accept a presentation without its own proof.
    #[arg(long)]
    pub unsigned: bool,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPresentationRequest {
    presentation: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
    unsigned_presentation: bool,
}

fn proof_label(status: ProofStatus) -> &'static str {
    match status {
        ProofStatus::Valid => "VALID",
        ProofStatus::Expired => "EXPIRED",
        ProofStatus::Invalid => "INVALID",
    }
}

fn vc_label(status: VcStatus) -> &'static str {
    match status {
        VcStatus::Success => "PASS",
        VcStatus::Expired => "EXPIRED",
        VcStatus::Invalid => "FAIL",
    }
}

pub async fn run(args: &VerifyPresentationArgs) -> anyhow::Result<()> {
    let presentation = read_document(&args.presentation)?;

    let url = format!("{}/api/v1/verify-presentation", args.endpoint);
    let body = VerifyPresentationRequest {
        presentation,
        challenge: args.challenge.clone(),
        domain: args.domain.clone(),
        unsigned_presentation: args.unsigned,
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

    let result: PresentationVerificationResult =
        bail_on_error("presentation verification", resp).await?.json().await?;
    println!("Presentation proof is {}", proof_label(result.proof_status));
    println!();
    if result.vc_results.is_empty() {
        println!("  (no credentials)");
    }
    for vc in &result.vc_results {
        let id = if vc.vc_id.len() > 72 {
            format!("{}...", &vc.vc_id.chars().take(72).collect::<String>())
        } else {
            vc.vc_id.clone()
        };
        println!("  [{}] {}", vc_label(vc.status), id);
    }
    Ok(())
}
