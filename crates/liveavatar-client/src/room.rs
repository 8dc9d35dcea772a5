//! The media room seam.
//!
//! The realtime transport (a LiveKit room) is an external system. The client
//! only needs a small slice of it: join and leave, publish a microphone
//! track, send reliable data messages, and observe remote tracks and data.
//! [`MediaRoom`] captures exactly that slice so the controllers in this crate
//! can run over the real transport or over [`LoopbackRoom`](crate::loopback::LoopbackRoom).

use crate::error::RoomError;
use async_trait::async_trait;
use liveavatar_types::ConnectionQuality;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A track published by another participant and subscribed by us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub sid: String,
    pub kind: TrackKind,
    pub participant_identity: String,
}

/// Capture options for the local microphone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicrophoneOptions {
    /// Input device to capture from; `None` selects the system default.
    pub device_id: Option<String>,
    /// Publish the track muted.
    pub start_muted: bool,
}

/// Events surfaced by the room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    TrackSubscribed(RemoteTrack),
    TrackUnsubscribed(RemoteTrack),
    DataReceived {
        topic: Option<String>,
        payload: Vec<u8>,
        participant_identity: Option<String>,
    },
    ConnectionQualityChanged(ConnectionQuality),
    Reconnecting,
    Reconnected,
    Disconnected {
        reason: Option<String>,
    },
}

/// A published local microphone track.
#[async_trait]
pub trait LocalAudioTrack: Send + Sync + std::fmt::Debug {
    fn sid(&self) -> &str;

    fn is_muted(&self) -> bool;

    async fn mute(&self) -> Result<(), RoomError>;

    async fn unmute(&self) -> Result<(), RoomError>;

    /// Switches the capture device of the live track. Returns `false` when the
    /// device exists but could not be selected.
    async fn switch_device(&self, device_id: &str) -> Result<bool, RoomError>;

    /// Releases the capture device.
    async fn stop(&self);
}

/// Connection to a realtime media room.
#[async_trait]
pub trait MediaRoom: Send + Sync {
    async fn connect(&self, url: &str, token: &str) -> Result<(), RoomError>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Captures the microphone and publishes it as a local audio track.
    async fn publish_microphone(
        &self,
        options: &MicrophoneOptions,
    ) -> Result<Arc<dyn LocalAudioTrack>, RoomError>;

    async fn unpublish_track(&self, sid: &str) -> Result<(), RoomError>;

    async fn publish_data(
        &self,
        payload: Vec<u8>,
        topic: &str,
        reliable: bool,
    ) -> Result<(), RoomError>;

    /// Subscribes to room events. Each call returns an independent receiver.
    fn subscribe(&self) -> broadcast::Receiver<RoomEvent>;
}
