//! In-process [`MediaRoom`] without a network transport.
//!
//! The loopback room accepts any credentials, records every data message
//! and track it is asked to publish, and lets its owner play the remote side
//! by injecting [`RoomEvent`]s. Used for offline runs and tests.

use crate::error::RoomError;
use crate::room::{LocalAudioTrack, MediaRoom, MicrophoneOptions, RoomEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

/// Default capacity for the room event broadcast channel.
const DEFAULT_EVENT_BROADCAST_CAPACITY: usize = 256;

/// Device id used when capture does not name one.
pub const DEFAULT_DEVICE_ID: &str = "default";

/// A data message published through the loopback room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentData {
    pub topic: String,
    pub payload: Vec<u8>,
    pub reliable: bool,
}

#[derive(Debug, Default)]
struct LoopbackState {
    connected: bool,
    credentials: Option<(String, String)>,
    tracks: Vec<Arc<LoopbackTrack>>,
    sent: Vec<SentData>,
    connect_failure: Option<String>,
    microphone_failure: Option<String>,
}

#[derive(Debug)]
pub struct LoopbackRoom {
    state: Mutex<LoopbackState>,
    devices: Arc<Vec<String>>,
    events: broadcast::Sender<RoomEvent>,
}

impl Default for LoopbackRoom {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackRoom {
    /// A room with a single `default` input device.
    pub fn new() -> Self {
        Self::with_devices([DEFAULT_DEVICE_ID])
    }

    pub fn with_devices<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BROADCAST_CAPACITY);
        Self {
            state: Mutex::new(LoopbackState::default()),
            devices: Arc::new(devices.into_iter().map(Into::into).collect()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes the next `connect` call fail with `reason`.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.lock().connect_failure = Some(reason.into());
    }

    /// Makes microphone capture fail with `reason` until cleared.
    pub fn deny_microphone(&self, reason: Option<String>) {
        self.lock().microphone_failure = reason;
    }

    /// Delivers an event to every subscriber as if it came from the remote side.
    pub fn emit(&self, event: RoomEvent) {
        if let RoomEvent::Disconnected { .. } = event {
            self.lock().connected = false;
        }
        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(event);
    }

    /// URL and token of the last successful `connect`.
    pub fn credentials(&self) -> Option<(String, String)> {
        self.lock().credentials.clone()
    }

    /// Data messages published so far, in order.
    pub fn sent_data(&self) -> Vec<SentData> {
        self.lock().sent.clone()
    }

    /// Currently published microphone tracks.
    pub fn published_tracks(&self) -> Vec<Arc<LoopbackTrack>> {
        self.lock().tracks.clone()
    }
}

#[async_trait]
impl MediaRoom for LoopbackRoom {
    async fn connect(&self, url: &str, token: &str) -> Result<(), RoomError> {
        let mut state = self.lock();
        if let Some(reason) = state.connect_failure.take() {
            return Err(RoomError::Connect(reason));
        }
        state.connected = true;
        state.credentials = Some((url.to_string(), token.to_string()));
        debug!(url, "loopback room connected");
        Ok(())
    }

    async fn disconnect(&self) {
        let tracks = {
            let mut state = self.lock();
            if !state.connected {
                return;
            }
            state.connected = false;
            std::mem::take(&mut state.tracks)
        };
        for track in tracks {
            track.stop().await;
        }
        let _ = self.events.send(RoomEvent::Disconnected {
            reason: Some("client initiated".to_string()),
        });
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn publish_microphone(
        &self,
        options: &MicrophoneOptions,
    ) -> Result<Arc<dyn LocalAudioTrack>, RoomError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(RoomError::NotConnected);
        }
        if let Some(reason) = &state.microphone_failure {
            return Err(RoomError::Device(reason.clone()));
        }
        let device = options
            .device_id
            .clone()
            .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());
        if !self.devices.contains(&device) {
            return Err(RoomError::Device(format!("unknown device {device}")));
        }

        let track = Arc::new(LoopbackTrack {
            sid: format!("TR_{}", uuid::Uuid::new_v4().simple()),
            muted: AtomicBool::new(options.start_muted),
            stopped: AtomicBool::new(false),
            device: Mutex::new(device),
            devices: Arc::clone(&self.devices),
        });
        state.tracks.push(Arc::clone(&track));
        Ok(track)
    }

    async fn unpublish_track(&self, sid: &str) -> Result<(), RoomError> {
        let mut state = self.lock();
        let before = state.tracks.len();
        state.tracks.retain(|t| t.sid != sid);
        if state.tracks.len() == before {
            return Err(RoomError::Track(format!("no published track {sid}")));
        }
        Ok(())
    }

    async fn publish_data(
        &self,
        payload: Vec<u8>,
        topic: &str,
        reliable: bool,
    ) -> Result<(), RoomError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(RoomError::NotConnected);
        }
        state.sent.push(SentData {
            topic: topic.to_string(),
            payload,
            reliable,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }
}

/// Microphone track handed out by [`LoopbackRoom`].
#[derive(Debug)]
pub struct LoopbackTrack {
    sid: String,
    muted: AtomicBool,
    stopped: AtomicBool,
    device: Mutex<String>,
    devices: Arc<Vec<String>>,
}

impl LoopbackTrack {
    pub fn device_id(&self) -> String {
        self.device
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), RoomError> {
        if self.is_stopped() {
            Err(RoomError::Track(format!("track {} is stopped", self.sid)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalAudioTrack for LoopbackTrack {
    fn sid(&self) -> &str {
        &self.sid
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    async fn mute(&self) -> Result<(), RoomError> {
        self.ensure_live()?;
        self.muted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unmute(&self) -> Result<(), RoomError> {
        self.ensure_live()?;
        self.muted.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn switch_device(&self, device_id: &str) -> Result<bool, RoomError> {
        self.ensure_live()?;
        if !self.devices.iter().any(|d| d == device_id) {
            return Ok(false);
        }
        *self.device.lock().unwrap_or_else(|e| e.into_inner()) = device_id.to_string();
        Ok(true)
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
