//! HTTP API server for the offline verifier node.
//!
//! Provides REST endpoints for node status, credential and presentation
//! verification, cache seeding and cache sync.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

use veritas_core::{CredentialFormat, PresentationVerificationResult, VerificationResult};
use veritas_credentials::{CacheBundle, ItemsUpdated, PresentationOptions, PrimedFromVc};
use veritas_sync::SyncResult;

use crate::commands::{NodeCommand, StatusResponse, SyncStatusResponse};
use crate::state::NodeState;

// --- Request / response types ---

#[derive(Deserialize)]
pub struct VerifyRequest {
    /// The credential, as a JSON object or as its serialized text.
    pub credential: Value,
    #[serde(default)]
    pub format: CredentialFormat,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPresentationRequest {
    pub presentation: Value,
    #[serde(flatten)]
    pub options: PresentationOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestBody {
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Deserialize)]
pub struct OrganizationQuery {
    #[serde(default, alias = "organizationId")]
    pub organization_id: Option<String>,
}

#[derive(Deserialize)]
pub struct PrimeFromCredentialRequest {
    pub credential: Value,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub cleared: bool,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// JSON text of a credential or presentation given either inline or as a
/// string.
fn document_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> ApiResult<StatusResponse> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    send_command_and_await(&state, NodeCommand::Status { reply: reply_tx }, reply_rx).await
}

async fn handle_verify(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<VerificationResult> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();

    let cmd = NodeCommand::Verify {
        credential: document_text(req.credential),
        format: req.format,
        reply: reply_tx,
    };

    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_verify_presentation(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<VerifyPresentationRequest>,
) -> ApiResult<PresentationVerificationResult> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();

    let cmd = NodeCommand::VerifyPresentation {
        presentation: document_text(req.presentation),
        options: req.options,
        reply: reply_tx,
    };

    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_sync(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<SyncRequestBody>,
) -> ApiResult<SyncResult> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();

    let cmd = NodeCommand::Sync {
        organization_id: req.organization_id,
        force: req.force,
        reply: reply_tx,
    };

    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_sync_status(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<OrganizationQuery>,
) -> ApiResult<SyncStatusResponse> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();

    let cmd = NodeCommand::SyncStatus {
        organization_id: query.organization_id,
        reply: reply_tx,
    };

    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_prime_cache(
    State(state): State<Arc<NodeState>>,
    Json(bundle): Json<CacheBundle>,
) -> ApiResult<ItemsUpdated> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    let cmd = NodeCommand::PrimeCache {
        bundle,
        reply: reply_tx,
    };
    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_prime_from_credential(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<PrimeFromCredentialRequest>,
) -> ApiResult<PrimedFromVc> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    let cmd = NodeCommand::PrimeFromCredential {
        credential: req.credential,
        reply: reply_tx,
    };
    send_command_and_await(&state, cmd, reply_rx).await
}

async fn handle_clear_cache(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<OrganizationQuery>,
) -> ApiResult<ClearedResponse> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    let cmd = NodeCommand::ClearCache {
        organization_id: query.organization_id,
        reply: reply_tx,
    };
    send_command_and_await(&state, cmd, reply_rx)
        .await
        .map(|_| Json(ClearedResponse { cleared: true }))
}

/// Helper to send a command and await the reply.
async fn send_command_and_await<T: Serialize>(
    state: &Arc<NodeState>,
    cmd: NodeCommand,
    reply_rx: tokio::sync::oneshot::Receiver<Result<T, String>>,
) -> ApiResult<T> {
    state.command_tx.send(cmd).await.map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "node event loop not running".into(),
            }),
        )
    })?;

    match reply_rx.await {
        Ok(Ok(resp)) => Ok(Json(resp)),
        Ok(Err(e)) => Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e }))),
        Err(_) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "event loop dropped the reply channel".into(),
            }),
        )),
    }
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/verify", post(handle_verify))
        .route("/api/v1/verify-presentation", post(handle_verify_presentation))
        .route("/api/v1/sync", post(handle_sync))
        .route("/api/v1/sync/status", get(handle_sync_status))
        .route("/api/v1/cache/prime", post(handle_prime_cache))
        .route("/api/v1/cache/prime-credential", post(handle_prime_from_credential))
        .route("/api/v1/cache", axum::routing::delete(handle_clear_cache))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<NodeState>) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
