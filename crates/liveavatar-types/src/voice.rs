//! Voice chat state and interactivity mode.

use crate::ParseLabelError;
use serde::{Deserialize, Serialize};

/// Lifecycle of the local microphone capture.
///
/// `Inactive → Starting → Active`; stopping returns to `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiceChatState {
    /// No track is published.
    #[default]
    Inactive,
    /// The microphone track is being created and published.
    Starting,
    /// The microphone track is published.
    Active,
}

impl VoiceChatState {
    /// Returns the canonical string label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Starting => "STARTING",
            Self::Active => "ACTIVE",
        }
    }
}

impl std::fmt::Display for VoiceChatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VoiceChatState {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INACTIVE" => Ok(Self::Inactive),
            "STARTING" => Ok(Self::Starting),
            "ACTIVE" => Ok(Self::Active),
            _ => Err(ParseLabelError::new("voice chat state", s)),
        }
    }
}

/// How user speech is captured during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionInteractivityMode {
    /// The microphone streams continuously and the avatar detects turns.
    #[default]
    Conversational,
    /// The user explicitly signals the start and end of each utterance.
    PushToTalk,
}

impl SessionInteractivityMode {
    /// Returns the canonical string label for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conversational => "CONVERSATIONAL",
            Self::PushToTalk => "PUSH_TO_TALK",
        }
    }
}

impl std::fmt::Display for SessionInteractivityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionInteractivityMode {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONVERSATIONAL" => Ok(Self::Conversational),
            "PUSH_TO_TALK" => Ok(Self::PushToTalk),
            _ => Err(ParseLabelError::new("interactivity mode", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_chat_state_serializes_as_label() {
        let json = serde_json::to_string(&VoiceChatState::Starting).unwrap();
        assert_eq!(json, "\"STARTING\"");
        assert_eq!(VoiceChatState::default(), VoiceChatState::Inactive);
    }

    #[test]
    fn interactivity_mode_parses_labels() {
        assert_eq!(
            "PUSH_TO_TALK".parse::<SessionInteractivityMode>().unwrap(),
            SessionInteractivityMode::PushToTalk
        );
        let err = "push_to_talk"
            .parse::<SessionInteractivityMode>()
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown interactivity mode: push_to_talk");
    }

    #[test]
    fn interactivity_mode_deserializes_from_json() {
        let mode: SessionInteractivityMode = serde_json::from_str("\"CONVERSATIONAL\"").unwrap();
        assert_eq!(mode, SessionInteractivityMode::Conversational);
        assert_eq!(mode.to_string(), "CONVERSATIONAL");
    }
}
