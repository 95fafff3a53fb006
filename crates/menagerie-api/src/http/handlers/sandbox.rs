//! Sandbox lifecycle handlers.
//!
//! Endpoints:
//! - POST /api/v1/sandbox               - Open a draft sandbox
//! - GET  /api/v1/sandbox               - List sandboxes
//! - GET  /api/v1/sandbox/{id}          - Get a sandbox (lazy expiry applies)
//! - POST /api/v1/sandbox/{id}/trial    - Run an ephemeral trial turn
//! - POST /api/v1/sandbox/{id}/tested   - Confirm as tested
//! - POST /api/v1/sandbox/{id}/promote  - Promote into production (capability-gated)

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use menagerie_types::generate::HistoryMessage;
use menagerie_types::sandbox::{CreateSandboxRequest, SandboxId};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Header carrying the externally-granted promotion capability token.
const CAPABILITY_HEADER: &str = "x-capability";

/// Request body for a trial turn. The caller keeps the trial transcript
/// itself and passes it back for multi-turn trials.
#[derive(Debug, Deserialize)]
pub struct TrialTurnBody {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

fn parse_id(s: &str) -> Result<SandboxId, AppError> {
    s.parse()
        .map_err(|_| AppError::Validation(format!("invalid sandbox id: {s}")))
}

/// POST /api/v1/sandbox - Open a draft sandbox.
pub async fn create_sandbox(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateSandboxRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let sandbox = state.sandbox_service.create_sandbox(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let sandbox_json =
        serde_json::to_value(&sandbox).map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(sandbox_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/sandbox/{}", sandbox.id))
        .with_link("trial", &format!("/api/v1/sandbox/{}/trial", sandbox.id));
    Ok(Json(resp))
}

/// GET /api/v1/sandbox - List sandbox rows (administrative).
pub async fn list_sandboxes(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let sandboxes = state.sandbox_service.list_sandboxes().await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = sandboxes
        .iter()
        .map(|s| serde_json::to_value(s).unwrap_or_default())
        .collect();
    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}

/// GET /api/v1/sandbox/{id} - Get a sandbox; overdue rows show Expired.
pub async fn get_sandbox(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let sandbox = state.sandbox_service.get_sandbox(&parse_id(&id)?).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let sandbox_json =
        serde_json::to_value(&sandbox).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(ApiResponse::success(sandbox_json, request_id, elapsed)))
}

/// POST /api/v1/sandbox/{id}/trial - Ephemeral trial exchange.
pub async fn trial_turn(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(body): Json<TrialTurnBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let output = state
        .sandbox_service
        .trial_turn(&parse_id(&id)?, &body.message, body.history)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(
        json!({
            "reply": output.content,
            "metadata": {
                "model": output.model,
                "tokens_used": output.tokens_used(),
                "processing_ms": output.processing_ms,
            },
        }),
        request_id,
        elapsed,
    );
    Ok(Json(resp))
}

/// POST /api/v1/sandbox/{id}/tested - Confirm the sandbox as tested.
pub async fn mark_tested(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let sandbox = state.sandbox_service.mark_tested(&parse_id(&id)?).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let sandbox_json =
        serde_json::to_value(&sandbox).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(ApiResponse::success(sandbox_json, request_id, elapsed)))
}

/// POST /api/v1/sandbox/{id}/promote - Promote into production.
///
/// The capability token arrives in the `X-Capability` header; what it
/// grants is decided by the external authorizer that issued it, the
/// engine only checks one was presented.
pub async fn promote(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let capability = headers
        .get(CAPABILITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let assistant = state
        .sandbox_service
        .promote(&parse_id(&id)?, capability)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let assistant_json =
        serde_json::to_value(&assistant).map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(assistant_json, request_id, elapsed)
        .with_link("assistant", &format!("/api/v1/assistant/{}", assistant.id));
    Ok(Json(resp))
}
