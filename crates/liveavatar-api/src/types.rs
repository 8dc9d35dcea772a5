//! Request and response bodies of the session endpoints.

use crate::error::ApiError;
use liveavatar_types::{SessionInteractivityMode, SessionMode};
use serde::{Deserialize, Serialize};

/// Voice, knowledge context and language of the avatar in `FULL` mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarPersona {
    pub voice_id: String,
    pub context_id: String,
    pub language: String,
}

/// Body of `POST /v1/sessions/token`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTokenRequest {
    pub mode: SessionMode,
    pub avatar_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_persona: Option<AvatarPersona>,
    /// Omitted for conversational sessions, which the service defaults to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactivity_type: Option<SessionInteractivityMode>,
    /// Sandbox sessions are free, short, and limited to a test avatar.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_sandbox: bool,
}

impl SessionTokenRequest {
    /// A `FULL` mode request for the given avatar.
    pub fn full(avatar_id: impl Into<String>, persona: AvatarPersona) -> Self {
        Self {
            mode: SessionMode::Full,
            avatar_id: avatar_id.into(),
            avatar_persona: Some(persona),
            interactivity_type: None,
            is_sandbox: false,
        }
    }

    pub fn with_interactivity(mut self, mode: SessionInteractivityMode) -> Self {
        self.interactivity_type = match mode {
            SessionInteractivityMode::Conversational => None,
            SessionInteractivityMode::PushToTalk => Some(mode),
        };
        self
    }

    pub fn sandbox(mut self, is_sandbox: bool) -> Self {
        self.is_sandbox = is_sandbox;
        self
    }
}

/// `data` of a successful token response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(default)]
    pub session_id: String,
    pub session_token: String,
}

/// `data` of a successful start response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: String,
    pub livekit_url: String,
    pub livekit_client_token: String,
    /// Hard limit on the session length in seconds, when the service sets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_session_duration: Option<u64>,
}

/// Wrapper around every upstream response body. `code` and `message` are
/// informational and ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
}

/// Rejects responses whose required fields are present but blank.
pub(crate) trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

fn require(value: &str, field: &'static str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::MissingField(field))
    } else {
        Ok(())
    }
}

impl Validate for SessionToken {
    fn validate(&self) -> Result<(), ApiError> {
        require(&self.session_token, "session_token")
    }
}

impl Validate for SessionStart {
    fn validate(&self) -> Result<(), ApiError> {
        require(&self.session_id, "session_id")?;
        require(&self.livekit_url, "livekit_url")?;
        require(&self.livekit_client_token, "livekit_client_token")
    }
}
