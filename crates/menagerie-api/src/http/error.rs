//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use menagerie_types::error::{
    AssistantError, ConversationError, RepositoryError, SandboxError,
};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Assistant lifecycle errors.
    Assistant(AssistantError),
    /// Sandbox lifecycle errors.
    Sandbox(SandboxError),
    /// Conversation engine errors.
    Conversation(ConversationError),
    /// Directory repository errors (personality/guardrail/animal CRUD).
    Repository(RepositoryError),
    /// Authentication failure.
    Unauthorized(String),
    /// Request validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<AssistantError> for AppError {
    fn from(e: AssistantError) -> Self {
        AppError::Assistant(e)
    }
}

impl From<SandboxError> for AppError {
    fn from(e: SandboxError) -> Self {
        AppError::Sandbox(e)
    }
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        AppError::Conversation(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl AppError {
    /// Status code, machine-readable code, and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Assistant(e) => match e {
                AssistantError::NotFound => {
                    (StatusCode::NOT_FOUND, "ASSISTANT_NOT_FOUND", e.to_string())
                }
                AssistantError::DuplicateAssistant(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_ASSISTANT", e.to_string())
                }
                AssistantError::InvalidAnimal(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ANIMAL", e.to_string())
                }
                AssistantError::TooManyKnowledgeRefs { .. } => {
                    (StatusCode::BAD_REQUEST, "TOO_MANY_KNOWLEDGE_REFS", e.to_string())
                }
                AssistantError::AnimalReassignmentForbidden => {
                    (StatusCode::CONFLICT, "ANIMAL_REASSIGNMENT_FORBIDDEN", e.to_string())
                }
                AssistantError::Compile(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "CONFIGURATION_UNRESOLVED",
                    e.to_string(),
                ),
                AssistantError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
                }
            },
            AppError::Sandbox(e) => match e {
                SandboxError::InvalidRequest(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.to_string())
                }
                SandboxError::NotFound => {
                    (StatusCode::NOT_FOUND, "SANDBOX_NOT_FOUND", e.to_string())
                }
                SandboxError::InvalidAnimal(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ANIMAL", e.to_string())
                }
                SandboxError::Expired => (StatusCode::GONE, "SANDBOX_EXPIRED", e.to_string()),
                SandboxError::NotYetTrialed => {
                    (StatusCode::CONFLICT, "NOT_YET_TRIALED", e.to_string())
                }
                SandboxError::NotTested => (StatusCode::CONFLICT, "NOT_TESTED", e.to_string()),
                SandboxError::Unauthorized => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string())
                }
                SandboxError::TooManyKnowledgeRefs { .. } => {
                    (StatusCode::BAD_REQUEST, "TOO_MANY_KNOWLEDGE_REFS", e.to_string())
                }
                SandboxError::Compile(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "CONFIGURATION_UNRESOLVED",
                    e.to_string(),
                ),
                SandboxError::Generate(_) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
                }
                SandboxError::GenerateTimeout => {
                    (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", e.to_string())
                }
                SandboxError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
                }
            },
            AppError::Conversation(e) => match e {
                ConversationError::InvalidRequest(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.to_string())
                }
                ConversationError::SessionMismatch => {
                    (StatusCode::CONFLICT, "SESSION_MISMATCH", e.to_string())
                }
                ConversationError::AssistantNotConfigured(_) => {
                    (StatusCode::NOT_FOUND, "ASSISTANT_NOT_CONFIGURED", e.to_string())
                }
                ConversationError::ConfigurationUnresolved(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "CONFIGURATION_UNRESOLVED",
                    e.to_string(),
                ),
                ConversationError::NotFound => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
                }
                ConversationError::GdprConfirmationRequired => (
                    StatusCode::BAD_REQUEST,
                    "GDPR_CONFIRMATION_REQUIRED",
                    e.to_string(),
                ),
                ConversationError::ReplyGeneratorTimeout => {
                    (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", e.to_string())
                }
                ConversationError::Upstream(_) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
                }
                ConversationError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
                }
            },
            AppError::Repository(e) => match e {
                RepositoryError::NotFound => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
                }
                RepositoryError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", e.to_string()),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    other.to_string(),
                ),
            },
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
