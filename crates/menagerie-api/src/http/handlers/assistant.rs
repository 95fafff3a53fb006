//! Assistant CRUD handlers.
//!
//! Endpoints:
//! - POST   /api/v1/assistant              - Configure an animal's assistant
//! - GET    /api/v1/assistant              - List assistants
//! - GET    /api/v1/assistant/{id}         - Get an assistant
//! - PUT    /api/v1/assistant/{id}         - Update (swap components / status)
//! - DELETE /api/v1/assistant/{id}         - Hard delete
//! - GET    /api/v1/assistant/{id}/prompt  - Current effective prompt

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use menagerie_types::assistant::{AssistantId, CreateAssistantRequest, UpdateAssistantRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

fn parse_id(s: &str) -> Result<AssistantId, AppError> {
    s.parse()
        .map_err(|_| AppError::Validation(format!("invalid assistant id: {s}")))
}

/// POST /api/v1/assistant - Configure an animal's assistant.
pub async fn create_assistant(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateAssistantRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let assistant = state.assistant_service.create_assistant(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let assistant_json =
        serde_json::to_value(&assistant).map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(assistant_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/assistant/{}", assistant.id))
        .with_link("prompt", &format!("/api/v1/assistant/{}/prompt", assistant.id));
    Ok(Json(resp))
}

/// GET /api/v1/assistant - List assistants.
pub async fn list_assistants(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let assistants = state.assistant_service.list_assistants().await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = assistants
        .iter()
        .map(|a| serde_json::to_value(a).unwrap_or_default())
        .collect();
    let resp = ApiResponse::success(data, request_id, elapsed).with_link("self", "/api/v1/assistant");
    Ok(Json(resp))
}

/// GET /api/v1/assistant/{id} - Get an assistant.
pub async fn get_assistant(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let assistant = state.assistant_service.get_assistant(&parse_id(&id)?).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let assistant_json =
        serde_json::to_value(&assistant).map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(assistant_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/assistant/{}", assistant.id))
        .with_link("prompt", &format!("/api/v1/assistant/{}/prompt", assistant.id));
    Ok(Json(resp))
}

/// PUT /api/v1/assistant/{id} - Update an assistant.
pub async fn update_assistant(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(body): Json<UpdateAssistantRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let assistant = state
        .assistant_service
        .update_assistant(&parse_id(&id)?, body)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let assistant_json =
        serde_json::to_value(&assistant).map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(assistant_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/assistant/{}", assistant.id));
    Ok(Json(resp))
}

/// DELETE /api/v1/assistant/{id} - Hard delete; history is untouched.
pub async fn delete_assistant(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.assistant_service.delete_assistant(&parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/assistant/{id}/prompt - The current effective prompt.
///
/// Served from cache only when the input hash still matches current
/// personality/guardrail state; otherwise recompiled on the spot.
pub async fn get_effective_prompt(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let assistant_id = parse_id(&id)?;
    let compiled = state
        .assistant_service
        .get_effective_prompt(&assistant_id)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(
        json!({
            "assistant_id": assistant_id,
            "effective_prompt": compiled.text,
            "input_hash": compiled.input_hash,
        }),
        request_id,
        elapsed,
    )
    .with_link("self", &format!("/api/v1/assistant/{assistant_id}/prompt"));
    Ok(Json(resp))
}
