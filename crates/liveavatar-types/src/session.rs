//! Session lifecycle, demo session modes and connection quality.

use crate::voice::SessionInteractivityMode;
use crate::ParseLabelError;
use serde::{Deserialize, Serialize};

/// Connection state of an avatar session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created but never started.
    #[default]
    Inactive,
    /// Starting upstream and joining the media room.
    Connecting,
    /// Joined the media room.
    Connected,
    /// Leaving the room and stopping the upstream session.
    Disconnecting,
    /// Terminal. A new session must be created to reconnect.
    Disconnected,
}

impl SessionState {
    /// Returns the canonical string label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnecting => "DISCONNECTING",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionState {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INACTIVE" => Ok(Self::Inactive),
            "CONNECTING" => Ok(Self::Connecting),
            "CONNECTED" => Ok(Self::Connected),
            "DISCONNECTING" => Ok(Self::Disconnecting),
            "DISCONNECTED" => Ok(Self::Disconnected),
            _ => Err(ParseLabelError::new("session state", s)),
        }
    }
}

/// Session flavour requested by the demo.
///
/// `FullPtt` is a `Full` session with push-to-talk interactivity; the two
/// share the same avatar action and text chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionMode {
    /// The hosted service runs speech recognition, the LLM and TTS.
    #[default]
    Full,
    /// `Full` with push-to-talk capture.
    FullPtt,
    /// The application drives the avatar's speech itself.
    Custom,
}

impl SessionMode {
    /// Returns the canonical string label for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::FullPtt => "FULL_PTT",
            Self::Custom => "CUSTOM",
        }
    }

    /// Mode used for avatar actions and text chat.
    pub fn actions_mode(self) -> Self {
        match self {
            Self::FullPtt => Self::Full,
            other => other,
        }
    }

    /// Interactivity requested for voice chat in this mode.
    pub fn interactivity(self) -> SessionInteractivityMode {
        match self {
            Self::FullPtt => SessionInteractivityMode::PushToTalk,
            Self::Full | Self::Custom => SessionInteractivityMode::Conversational,
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionMode {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL" => Ok(Self::Full),
            "FULL_PTT" => Ok(Self::FullPtt),
            "CUSTOM" => Ok(Self::Custom),
            _ => Err(ParseLabelError::new("session mode", s)),
        }
    }
}

/// Media connection quality as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionQuality {
    #[default]
    Unknown,
    Excellent,
    Good,
    Poor,
    Lost,
}

impl ConnectionQuality {
    /// Returns the canonical string label for this quality.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Poor => "POOR",
            Self::Lost => "LOST",
        }
    }
}

impl std::fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectionQuality {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "EXCELLENT" => Ok(Self::Excellent),
            "GOOD" => Ok(Self::Good),
            "POOR" => Ok(Self::Poor),
            "LOST" => Ok(Self::Lost),
            _ => Err(ParseLabelError::new("connection quality", s)),
        }
    }
}
