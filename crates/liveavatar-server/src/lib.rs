//! LiveAvatar token proxy library logic.
//!
//! Keeps the account API key on the server: the browser asks this service
//! for a session token (or for ready-made media room credentials) and never
//! talks to the upstream API with the key itself.

pub mod api;
pub mod config;

use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Extension, Json, Router};
use liveavatar_api::{ApiError, AvatarPersona, LiveAvatarClient};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Upstream API client.
    pub api: Arc<LiveAvatarClient>,
    /// Avatar every session is created for.
    pub avatar_id: String,
    /// `FULL` mode voice, context and language.
    pub persona: AvatarPersona,
    /// Request sandbox sessions.
    pub is_sandbox: bool,
}

impl AppState {
    /// # Errors
    ///
    /// Fails if the upstream HTTP client cannot be built.
    pub fn from_config(config: &config::HeyGenConfig) -> Result<Self, ApiError> {
        Ok(Self {
            api: Arc::new(LiveAvatarClient::new(config.api_config())?),
            avatar_id: config.avatar_id.clone(),
            persona: config.persona(),
            is_sandbox: config.is_sandbox,
        })
    }
}

/// Maximum request body size (64 KiB). Every route takes a tiny JSON body.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/get-livekit-token",
            post(api::get_livekit_token_handler),
        )
        .route("/api/start-session", post(api::start_session_handler))
        .route("/api/stop-session", post(api::stop_session_handler))
        .route("/api/keep-alive", post(api::keep_alive_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
