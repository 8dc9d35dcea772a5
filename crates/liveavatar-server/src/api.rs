//! Token proxy handlers.
//!
//! Each handler forwards to the upstream session API with the server's
//! credentials and reshapes the response for the browser. Every failure is
//! reported as `{"error": message}`.

use crate::AppState;
use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use liveavatar_api::{ApiError, SessionTokenRequest};
use liveavatar_types::SessionInteractivityMode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Media room credentials for a started session.
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveKitCredentials {
    pub url: String,
    pub token: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Request body for `POST /api/start-session`.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(rename = "pushToTalk", default)]
    pub push_to_talk: bool,
}

/// Response body for `POST /api/start-session`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_token: String,
}

/// Request body for the routes that act on an existing session.
#[derive(Debug, Default, Deserialize)]
pub struct SessionTokenBody {
    #[serde(default)]
    pub session_token: String,
}

/// API error type mapping to HTTP responses.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("Failed to get token: {0}")]
    Token(ApiError),
    #[error("Failed to start session: {0}")]
    Start(ApiError),
    #[error("Failed to stop session: {0}")]
    Stop(ApiError),
    #[error("Failed to keep session alive: {0}")]
    KeepAlive(ApiError),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        tracing::error!(status = status.as_u16(), error = %message, "proxy request failed");

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Parses an optional JSON body; an empty body yields the default.
fn parse_body<T>(body: &Bytes) -> Result<T, ProxyError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ProxyError::BadRequest(e.to_string()))
}

fn token_request(state: &AppState, mode: SessionInteractivityMode) -> SessionTokenRequest {
    SessionTokenRequest::full(state.avatar_id.clone(), state.persona.clone())
        .with_interactivity(mode)
        .sandbox(state.is_sandbox)
}

/// Handler for `POST /api/get-livekit-token`.
///
/// Creates a `FULL` mode session, starts it, and returns the media room
/// credentials so a plain LiveKit client can join directly.
pub async fn get_livekit_token_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<LiveKitCredentials>, ProxyError> {
    let request = token_request(&state, SessionInteractivityMode::Conversational);
    let token = state
        .api
        .create_session_token(&request)
        .await
        .map_err(ProxyError::Token)?;

    let start = state
        .api
        .start_session(&token.session_token)
        .await
        .map_err(ProxyError::Start)?;

    tracing::info!(session_id = %start.session_id, "issued livekit credentials");

    Ok(Json(LiveKitCredentials {
        url: start.livekit_url,
        token: start.livekit_client_token,
        session_id: start.session_id,
    }))
}

/// Handler for `POST /api/start-session`.
///
/// Returns only a session token; the client SDK starts the session itself.
pub async fn start_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StartSessionResponse>, ProxyError> {
    let payload: StartSessionRequest = parse_body(&body)?;
    let mode = if payload.push_to_talk {
        SessionInteractivityMode::PushToTalk
    } else {
        SessionInteractivityMode::Conversational
    };

    let token = state
        .api
        .create_session_token(&token_request(&state, mode))
        .await
        .map_err(ProxyError::Token)?;

    tracing::info!(
        session_id = %token.session_id,
        interactivity = %mode,
        "issued session token"
    );

    Ok(Json(StartSessionResponse {
        session_token: token.session_token,
    }))
}

fn require_token(body: &Bytes) -> Result<String, ProxyError> {
    let payload: SessionTokenBody = parse_body(body)?;
    if payload.session_token.trim().is_empty() {
        return Err(ProxyError::BadRequest("session_token is required".to_string()));
    }
    Ok(payload.session_token)
}

/// Handler for `POST /api/stop-session`.
pub async fn stop_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ProxyError> {
    let session_token = require_token(&body)?;
    state
        .api
        .stop_session(&session_token)
        .await
        .map_err(ProxyError::Stop)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Handler for `POST /api/keep-alive`.
pub async fn keep_alive_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ProxyError> {
    let session_token = require_token(&body)?;
    state
        .api
        .keep_alive(&session_token)
        .await
        .map_err(ProxyError::KeepAlive)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
