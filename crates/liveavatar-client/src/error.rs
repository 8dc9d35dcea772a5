use liveavatar_api::ApiError;
use liveavatar_types::{SessionInteractivityMode, SessionState};
use thiserror::Error;

/// Failures reported by a [`MediaRoom`](crate::room::MediaRoom) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room is not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("microphone unavailable: {0}")]
    Device(String),

    #[error("track error: {0}")]
    Track(String),

    #[error("data channel error: {0}")]
    Data(String),
}

#[derive(Error, Debug)]
pub enum VoiceChatError {
    #[error("voice chat requires a connected room")]
    NotConnected,

    #[error("voice chat is not active")]
    NotActive,

    #[error("operation requires {expected} mode, voice chat is in {actual} mode")]
    WrongMode {
        expected: SessionInteractivityMode,
        actual: SessionInteractivityMode,
    },

    #[error("room error: {0}")]
    Room(#[from] RoomError),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("upstream API error: {0}")]
    Api(#[from] ApiError),

    #[error("room error: {0}")]
    Room(#[from] RoomError),

    #[error("voice chat error: {0}")]
    VoiceChat(#[from] VoiceChatError),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("not supported in {0} mode")]
    Unsupported(liveavatar_types::SessionMode),
}
