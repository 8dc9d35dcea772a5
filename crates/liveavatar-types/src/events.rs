//! Data-channel messages exchanged with the avatar.
//!
//! Commands are JSON objects published on [`COMMAND_TOPIC`]; the avatar
//! replies with JSON objects on [`RESPONSE_TOPIC`]. Both carry an
//! `event_type` discriminator.

use crate::ParseLabelError;
use serde::{Deserialize, Serialize};

/// Topic for client → avatar commands.
pub const COMMAND_TOPIC: &str = "agent-control";

/// Topic for avatar → client events.
pub const RESPONSE_TOPIC: &str = "agent-response";

/// Commands a client can send to the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandEvent {
    /// Stop the avatar mid-utterance.
    #[serde(rename = "avatar.interrupt")]
    Interrupt,
    /// Speak the given text verbatim.
    #[serde(rename = "avatar.speak_text")]
    SpeakText,
    /// Treat the given text as user input and speak the generated reply.
    #[serde(rename = "avatar.speak_response")]
    SpeakResponse,
    #[serde(rename = "avatar.start_listening")]
    StartListening,
    #[serde(rename = "avatar.stop_listening")]
    StopListening,
    #[serde(rename = "user.start_push_to_talk")]
    StartPushToTalk,
    #[serde(rename = "user.stop_push_to_talk")]
    StopPushToTalk,
}

impl CommandEvent {
    /// Returns the wire name of this command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "avatar.interrupt",
            Self::SpeakText => "avatar.speak_text",
            Self::SpeakResponse => "avatar.speak_response",
            Self::StartListening => "avatar.start_listening",
            Self::StopListening => "avatar.stop_listening",
            Self::StartPushToTalk => "user.start_push_to_talk",
            Self::StopPushToTalk => "user.stop_push_to_talk",
        }
    }
}

impl std::fmt::Display for CommandEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommandEvent {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avatar.interrupt" => Ok(Self::Interrupt),
            "avatar.speak_text" => Ok(Self::SpeakText),
            "avatar.speak_response" => Ok(Self::SpeakResponse),
            "avatar.start_listening" => Ok(Self::StartListening),
            "avatar.stop_listening" => Ok(Self::StopListening),
            "user.start_push_to_talk" => Ok(Self::StartPushToTalk),
            "user.stop_push_to_talk" => Ok(Self::StopPushToTalk),
            _ => Err(ParseLabelError::new("command event", s)),
        }
    }
}

/// Events the avatar publishes back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerEvent {
    #[serde(rename = "user.speak_started")]
    UserSpeakStarted,
    #[serde(rename = "user.speak_ended")]
    UserSpeakEnded,
    #[serde(rename = "avatar.speak_started")]
    AvatarSpeakStarted,
    #[serde(rename = "avatar.speak_ended")]
    AvatarSpeakEnded,
    #[serde(rename = "user.transcription")]
    UserTranscription,
    #[serde(rename = "avatar.transcription")]
    AvatarTranscription,
    #[serde(rename = "session.stopped")]
    SessionStopped,
}

impl ServerEvent {
    /// Returns the wire name of this event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserSpeakStarted => "user.speak_started",
            Self::UserSpeakEnded => "user.speak_ended",
            Self::AvatarSpeakStarted => "avatar.speak_started",
            Self::AvatarSpeakEnded => "avatar.speak_ended",
            Self::UserTranscription => "user.transcription",
            Self::AvatarTranscription => "avatar.transcription",
            Self::SessionStopped => "session.stopped",
        }
    }
}

impl std::fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServerEvent {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user.speak_started" => Ok(Self::UserSpeakStarted),
            "user.speak_ended" => Ok(Self::UserSpeakEnded),
            "avatar.speak_started" => Ok(Self::AvatarSpeakStarted),
            "avatar.speak_ended" => Ok(Self::AvatarSpeakEnded),
            "user.transcription" => Ok(Self::UserTranscription),
            "avatar.transcription" => Ok(Self::AvatarTranscription),
            "session.stopped" => Ok(Self::SessionStopped),
            _ => Err(ParseLabelError::new("server event", s)),
        }
    }
}

/// A command as framed on the data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub event_type: CommandEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CommandMessage {
    pub fn new(event_type: CommandEvent, session_id: Option<String>) -> Self {
        Self {
            event_type,
            session_id,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Serialises the command to its JSON wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// An event received from the avatar.
///
/// `event_type` is kept as a raw string so that event types this crate does
/// not know about still reach the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ServerMessage {
    /// Parses a server message from its JSON wire bytes.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Returns the known event for this message, if any.
    pub fn event(&self) -> Option<ServerEvent> {
        self.event_type.parse().ok()
    }
}
