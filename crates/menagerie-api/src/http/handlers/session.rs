//! Administrative session browsing handlers.
//!
//! Endpoints:
//! - GET /api/v1/conversations/sessions      - List sessions with derived fields
//! - GET /api/v1/conversations/sessions/{id} - Detail for one session

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use menagerie_types::conversation::SessionId;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Query parameters for session listing.
#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/v1/conversations/sessions - List sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let details = state
        .conversation_service
        .list_sessions(Some(query.limit), Some(query.offset))
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let data = details
        .iter()
        .map(|d| serde_json::to_value(d).unwrap_or_default())
        .collect();

    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("self", "/api/v1/conversations/sessions");
    Ok(Json(resp))
}

/// GET /api/v1/conversations/sessions/{id} - Session detail.
pub async fn get_session_detail(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let sid: SessionId = session_id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid session id: {session_id}")))?;
    let detail = state.conversation_service.session_detail(&sid).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let detail_json =
        serde_json::to_value(&detail).map_err(|e| AppError::Internal(e.to_string()))?;

    let resp = ApiResponse::success(detail_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/conversations/sessions/{sid}"))
        .with_link(
            "history",
            &format!("/api/v1/convo_history?session_id={sid}"),
        );
    Ok(Json(resp))
}
