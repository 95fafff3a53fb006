//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/` and require an API key, except
//! `/health`. Middleware: CORS, tracing.

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Conversation engine
        .route("/convo_turn", post(handlers::convo::post_turn))
        .route("/convo_history", get(handlers::convo::get_history))
        .route("/convo_history", delete(handlers::convo::delete_history))
        .route(
            "/conversations/sessions",
            get(handlers::session::list_sessions),
        )
        .route(
            "/conversations/sessions/{id}",
            get(handlers::session::get_session_detail),
        )
        // Assistant CRUD
        .route("/assistant", post(handlers::assistant::create_assistant))
        .route("/assistant", get(handlers::assistant::list_assistants))
        .route("/assistant/{id}", get(handlers::assistant::get_assistant))
        .route("/assistant/{id}", put(handlers::assistant::update_assistant))
        .route(
            "/assistant/{id}",
            delete(handlers::assistant::delete_assistant),
        )
        .route(
            "/assistant/{id}/prompt",
            get(handlers::assistant::get_effective_prompt),
        )
        // Sandbox lifecycle
        .route("/sandbox", post(handlers::sandbox::create_sandbox))
        .route("/sandbox", get(handlers::sandbox::list_sandboxes))
        .route("/sandbox/{id}", get(handlers::sandbox::get_sandbox))
        .route("/sandbox/{id}/trial", post(handlers::sandbox::trial_turn))
        .route("/sandbox/{id}/tested", post(handlers::sandbox::mark_tested))
        .route("/sandbox/{id}/promote", post(handlers::sandbox::promote))
        // Directory
        .route(
            "/personalities",
            post(handlers::directory::create_personality)
                .get(handlers::directory::list_personalities),
        )
        .route(
            "/personalities/{id}",
            get(handlers::directory::get_personality)
                .put(handlers::directory::update_personality),
        )
        .route(
            "/guardrails",
            post(handlers::directory::create_guardrail).get(handlers::directory::list_guardrails),
        )
        .route(
            "/guardrails/{id}",
            get(handlers::directory::get_guardrail).put(handlers::directory::update_guardrail),
        )
        .route(
            "/animals",
            post(handlers::directory::create_animal).get(handlers::directory::list_animals),
        )
        .route(
            "/animals/{id}/active",
            put(handlers::directory::set_animal_active),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
