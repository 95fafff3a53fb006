//! Conversation turn and history handlers.
//!
//! Endpoints:
//! - POST   /api/v1/convo_turn    - Post a message, get the ambassador's reply
//! - GET    /api/v1/convo_history - Retrieve history by session/animal/user
//! - DELETE /api/v1/convo_history - Delete history by session/animal/user

use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use menagerie_types::conversation::{HistoryFilter, PostTurnRequest, SessionHistory};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for POST /convo_turn.
#[derive(Debug, Deserialize)]
pub struct ConvoTurnBody {
    /// Existing session to continue; a new session is created when absent.
    pub session_id: Option<String>,
    pub animal_id: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<ConvoTurnMeta>,
}

/// Optional caller metadata on a turn request.
#[derive(Debug, Default, Deserialize)]
pub struct ConvoTurnMeta {
    pub user_id: Option<String>,
    pub context_turns: Option<u32>,
    /// Client-generated idempotency key for safe resubmission.
    pub request_id: Option<String>,
}

/// Query parameters selecting a history scope. Exactly one of the three
/// id fields must be present.
#[derive(Debug, Deserialize)]
pub struct HistoryScopeQuery {
    pub session_id: Option<String>,
    pub animal_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub include_metadata: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub confirm_gdpr: bool,
    pub audit_reason: Option<String>,
}

impl HistoryScopeQuery {
    fn filter(&self) -> Result<HistoryFilter, AppError> {
        let given = [
            self.session_id.is_some(),
            self.animal_id.is_some(),
            self.user_id.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count();
        if given != 1 {
            return Err(AppError::Validation(
                "exactly one of session_id, animal_id, user_id is required".to_string(),
            ));
        }

        if let Some(sid) = &self.session_id {
            return Ok(HistoryFilter::Session(sid.parse().map_err(|_| {
                AppError::Validation(format!("invalid session_id: {sid}"))
            })?));
        }
        if let Some(aid) = &self.animal_id {
            return Ok(HistoryFilter::Animal(aid.parse().map_err(|_| {
                AppError::Validation(format!("invalid animal_id: {aid}"))
            })?));
        }
        // `given == 1` guarantees user_id is present here.
        let uid = self.user_id.clone().unwrap_or_default();
        Ok(HistoryFilter::User(uid))
    }
}

/// POST /api/v1/convo_turn - Post a message and receive the reply.
pub async fn post_turn(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<ConvoTurnBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let session_id = body
        .session_id
        .as_deref()
        .map(|s| {
            s.parse()
                .map_err(|_| AppError::Validation(format!("invalid session_id: {s}")))
        })
        .transpose()?;
    let animal_id = body
        .animal_id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid animal_id: {}", body.animal_id)))?;

    let metadata = body.metadata.unwrap_or_default();
    let receipt = state
        .conversation_service
        .post_turn(PostTurnRequest {
            session_id,
            animal_id,
            // Walk-up kiosk visitors have no account; they all share the
            // anonymous user bucket.
            user_id: metadata.user_id.unwrap_or_else(|| "anonymous".to_string()),
            message: body.message,
            context_turns: metadata.context_turns,
            request_id: metadata.request_id,
        })
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let receipt_json = serde_json::to_value(&receipt)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let resp = ApiResponse::success(receipt_json, request_id, elapsed).with_link(
        "history",
        &format!("/api/v1/convo_history?session_id={}", receipt.session_id),
    );
    Ok(Json(resp))
}

/// GET /api/v1/convo_history - History for a session, animal, or user.
pub async fn get_history(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<HistoryScopeQuery>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let filter = query.filter()?;
    let histories = state
        .conversation_service
        .get_history(&filter, query.include_metadata, query.limit, query.offset)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let data = histories.iter().map(history_json).collect();

    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}

/// DELETE /api/v1/convo_history - Delete history; 204 on success.
///
/// Deleting by user requires `confirm_gdpr=true` and a non-empty
/// `audit_reason`, otherwise the gate rejects with 400 and nothing is
/// deleted.
pub async fn delete_history(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<HistoryScopeQuery>,
) -> Result<StatusCode, AppError> {
    let filter = query.filter()?;
    state
        .conversation_service
        .delete_history(&filter, query.confirm_gdpr, query.audit_reason.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn history_json(history: &SessionHistory) -> serde_json::Value {
    json!({
        "session_id": history.session.id,
        "user_id": history.session.user_id,
        "animal_id": history.session.animal_id,
        "animal_name": history.session.animal_name,
        "started_at": history.session.started_at,
        "last_message_at": history.session.last_message_at,
        "message_count": history.session.message_count,
        "messages": history.turns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(
        session_id: Option<&str>,
        animal_id: Option<&str>,
        user_id: Option<&str>,
    ) -> HistoryScopeQuery {
        HistoryScopeQuery {
            session_id: session_id.map(String::from),
            animal_id: animal_id.map(String::from),
            user_id: user_id.map(String::from),
            include_metadata: false,
            limit: None,
            offset: None,
            confirm_gdpr: false,
            audit_reason: None,
        }
    }

    #[test]
    fn test_scope_requires_exactly_one_filter() {
        assert!(scope(None, None, None).filter().is_err());
        assert!(scope(Some("not-a-uuid"), None, Some("u")).filter().is_err());
        assert!(scope(None, None, Some("visitor-7")).filter().is_ok());
    }

    #[test]
    fn test_scope_rejects_malformed_uuid() {
        assert!(scope(Some("not-a-uuid"), None, None).filter().is_err());
        let sid = uuid::Uuid::now_v7().to_string();
        assert!(scope(Some(&sid), None, None).filter().is_ok());
    }

    #[test]
    fn test_turn_body_accepts_minimal_payload() {
        let body: ConvoTurnBody = serde_json::from_str(
            r#"{"animal_id":"0192aaaa-0000-7000-8000-000000000000","message":"Hello!"}"#,
        )
        .unwrap();
        assert!(body.session_id.is_none());
        assert!(body.metadata.is_none());
    }
}
