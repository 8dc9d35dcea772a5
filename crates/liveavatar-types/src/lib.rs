//! Shared types for the LiveAvatar workspace.
//!
//! This crate holds the enumerations and data-channel wire types used by the
//! upstream API client, the client SDK and the token proxy server: voice chat
//! and session states, interactivity modes, and the command/event names
//! exchanged with the avatar over the media room's data channel.
//!
//! Every enum has a canonical string form (`as_str`, `Display`, `FromStr`)
//! matching its serde representation.

pub mod events;
pub mod session;
pub mod voice;

pub use events::{
    CommandEvent, CommandMessage, ServerEvent, ServerMessage, COMMAND_TOPIC, RESPONSE_TOPIC,
};
pub use session::{ConnectionQuality, SessionMode, SessionState};
pub use voice::{SessionInteractivityMode, VoiceChatState};

/// Error returned when parsing an unrecognised enum label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseLabelError {
    /// The type that was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseLabelError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
