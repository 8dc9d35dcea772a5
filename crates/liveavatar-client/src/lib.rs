//! Client SDK for LiveAvatar sessions.
//!
//! Drives an avatar conversation from a session token issued by the token
//! proxy. The media transport sits behind the [`MediaRoom`] trait; the
//! controllers here own only the session lifecycle, microphone capture and
//! the data-channel commands.
//!
//! | Type | Role |
//! |------|------|
//! | [`AvatarSession`] | Upstream start/stop, room join, stream readiness, avatar commands |
//! | [`VoiceChat`] | Microphone publish, mute, device switching, push-to-talk |
//! | [`DemoView`] | Idle/session screen reducer for the demo front end |
//! | [`LoopbackRoom`] | In-process `MediaRoom` for offline runs and tests |

pub mod demo;
pub mod error;
pub mod loopback;
pub mod room;
pub mod session;
pub mod voice_chat;

pub use demo::{DemoAction, DemoView, Screen};
pub use error::{RoomError, SessionError, VoiceChatError};
pub use loopback::{LoopbackRoom, LoopbackTrack, SentData};
pub use room::{LocalAudioTrack, MediaRoom, MicrophoneOptions, RemoteTrack, RoomEvent, TrackKind};
pub use session::{AvatarSession, RemoteStream, SessionConfig, SessionEvent};
pub use voice_chat::{VoiceChat, VoiceChatConfig, VoiceChatEvent};
