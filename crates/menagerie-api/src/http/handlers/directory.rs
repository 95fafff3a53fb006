//! Directory CRUD handlers: personalities, guardrails, animals.
//!
//! These are the building blocks assistants are assembled from. Editing a
//! personality or guardrail bumps its version; dependent assistants catch
//! up lazily on their next prompt read.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use menagerie_types::animal::{AnimalId, CreateAnimalRequest};
use menagerie_types::guardrail::{CreateGuardrailRequest, GuardrailId, UpdateGuardrailRequest};
use menagerie_types::personality::{
    CreatePersonalityRequest, PersonalityId, UpdatePersonalityRequest,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

// --- Personalities ---

/// POST /api/v1/personalities
pub async fn create_personality(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreatePersonalityRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let personality = state.directory_service.create_personality(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(to_json(&personality)?, request_id, elapsed)
        .with_link("self", &format!("/api/v1/personalities/{}", personality.id));
    Ok(Json(resp))
}

/// GET /api/v1/personalities
pub async fn list_personalities(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let personalities = state.directory_service.list_personalities().await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = personalities
        .iter()
        .map(|p| serde_json::to_value(p).unwrap_or_default())
        .collect();
    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}

/// GET /api/v1/personalities/{id}
pub async fn get_personality(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let pid: PersonalityId = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid personality id: {id}")))?;
    let personality = state
        .directory_service
        .get_personality(&pid)
        .await?
        .ok_or(AppError::Repository(
            menagerie_types::error::RepositoryError::NotFound,
        ))?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(to_json(&personality)?, request_id, elapsed)))
}

/// PUT /api/v1/personalities/{id} - Edit in place; bumps version.
pub async fn update_personality(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(body): Json<UpdatePersonalityRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let pid: PersonalityId = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid personality id: {id}")))?;
    let personality = state.directory_service.update_personality(&pid, body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(to_json(&personality)?, request_id, elapsed)))
}

// --- Guardrails ---

/// POST /api/v1/guardrails
pub async fn create_guardrail(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateGuardrailRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let guardrail = state.directory_service.create_guardrail(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(to_json(&guardrail)?, request_id, elapsed)
        .with_link("self", &format!("/api/v1/guardrails/{}", guardrail.id));
    Ok(Json(resp))
}

/// GET /api/v1/guardrails
pub async fn list_guardrails(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let guardrails = state.directory_service.list_guardrails().await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = guardrails
        .iter()
        .map(|g| serde_json::to_value(g).unwrap_or_default())
        .collect();
    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}

/// GET /api/v1/guardrails/{id}
pub async fn get_guardrail(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let gid: GuardrailId = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid guardrail id: {id}")))?;
    let guardrail = state
        .directory_service
        .get_guardrail(&gid)
        .await?
        .ok_or(AppError::Repository(
            menagerie_types::error::RepositoryError::NotFound,
        ))?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(to_json(&guardrail)?, request_id, elapsed)))
}

/// PUT /api/v1/guardrails/{id} - Edit in place; bumps version.
pub async fn update_guardrail(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(body): Json<UpdateGuardrailRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let gid: GuardrailId = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid guardrail id: {id}")))?;
    let guardrail = state.directory_service.update_guardrail(&gid, body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(to_json(&guardrail)?, request_id, elapsed)))
}

// --- Animals ---

/// Request body for the animal active flag.
#[derive(Debug, Deserialize)]
pub struct SetActiveBody {
    pub active: bool,
}

/// POST /api/v1/animals
pub async fn create_animal(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<CreateAnimalRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let animal = state.directory_service.create_animal(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(to_json(&animal)?, request_id, elapsed)
        .with_link("self", &format!("/api/v1/animals/{}", animal.id));
    Ok(Json(resp))
}

/// GET /api/v1/animals
pub async fn list_animals(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let animals = state.directory_service.list_animals().await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = animals
        .iter()
        .map(|a| serde_json::to_value(a).unwrap_or_default())
        .collect();
    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}

/// PUT /api/v1/animals/{id}/active - Flip the active flag.
pub async fn set_animal_active(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(body): Json<SetActiveBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let aid: AnimalId = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid animal id: {id}")))?;
    state.directory_service.set_animal_active(&aid, body.active).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(
        serde_json::json!({"animal_id": aid, "active": body.active}),
        request_id,
        elapsed,
    )))
}
