//! Local microphone capture over a media room.
//!
//! [`VoiceChat`] owns at most one published microphone track. In
//! conversational mode the track streams continuously and mute/unmute is the
//! only control. In push-to-talk mode the track is published muted; each
//! utterance is bracketed by a `user.start_push_to_talk` /
//! `user.stop_push_to_talk` command on the data channel, with the track
//! unmuted in between.

use crate::error::VoiceChatError;
use crate::room::{LocalAudioTrack, MediaRoom, MicrophoneOptions};
use liveavatar_types::{
    CommandEvent, CommandMessage, SessionInteractivityMode, VoiceChatState, COMMAND_TOPIC,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default capacity for the voice chat event broadcast channel.
const DEFAULT_VOICE_EVENT_BROADCAST_CAPACITY: usize = 64;

/// Options for [`VoiceChat::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChatConfig {
    /// Publish the microphone muted.
    #[serde(default)]
    pub default_muted: bool,
    /// Input device; the system default when absent.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Overrides the mode set with [`VoiceChat::set_mode`].
    #[serde(default)]
    pub mode: Option<SessionInteractivityMode>,
}

impl VoiceChatConfig {
    pub fn push_to_talk() -> Self {
        Self {
            mode: Some(SessionInteractivityMode::PushToTalk),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceChatEvent {
    StateChanged(VoiceChatState),
    Muted,
    Unmuted,
    DeviceChanged(String),
}

#[derive(Debug, Default)]
struct Inner {
    state: VoiceChatState,
    track: Option<Arc<dyn LocalAudioTrack>>,
    mode: SessionInteractivityMode,
    push_to_talk_started: bool,
    session_id: Option<String>,
}

pub struct VoiceChat {
    room: Arc<dyn MediaRoom>,
    /// Only held for field access, never across an `.await`.
    inner: Mutex<Inner>,
    /// Serialises the async operations so publish/unpublish never interleave.
    op_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<VoiceChatEvent>,
}

impl std::fmt::Debug for VoiceChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner();
        f.debug_struct("VoiceChat")
            .field("state", &inner.state)
            .field("mode", &inner.mode)
            .field("push_to_talk_started", &inner.push_to_talk_started)
            .finish_non_exhaustive()
    }
}

impl VoiceChat {
    pub fn new(room: Arc<dyn MediaRoom>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_VOICE_EVENT_BROADCAST_CAPACITY);
        Self {
            room,
            inner: Mutex::new(Inner::default()),
            op_lock: tokio::sync::Mutex::new(()),
            events,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceChatEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: VoiceChatEvent) {
        let _ = self.events.send(event);
    }

    /// Sets the interactivity mode applied by the next [`start`](Self::start).
    pub fn set_mode(&self, mode: SessionInteractivityMode) {
        self.inner().mode = mode;
    }

    pub fn mode(&self) -> SessionInteractivityMode {
        self.inner().mode
    }

    /// Session id stamped on push-to-talk commands.
    pub fn set_session_id(&self, session_id: Option<String>) {
        self.inner().session_id = session_id;
    }

    pub fn state(&self) -> VoiceChatState {
        self.inner().state
    }

    /// `true` when no track is published.
    pub fn is_muted(&self) -> bool {
        self.inner()
            .track
            .as_ref()
            .map_or(true, |track| track.is_muted())
    }

    pub fn is_push_to_talk_started(&self) -> bool {
        self.inner().push_to_talk_started
    }

    fn set_state(&self, state: VoiceChatState) {
        let changed = {
            let mut inner = self.inner();
            let changed = inner.state != state;
            inner.state = state;
            changed
        };
        if changed {
            debug!(state = %state, "voice chat state changed");
            self.emit(VoiceChatEvent::StateChanged(state));
        }
    }

    /// Publishes the microphone. A no-op unless the voice chat is inactive.
    ///
    /// # Errors
    ///
    /// `NotConnected` if the room is not joined; `Room` if capture or
    /// publishing fails, in which case the state returns to `INACTIVE`.
    pub async fn start(&self, config: VoiceChatConfig) -> Result<(), VoiceChatError> {
        let _op = self.op_lock.lock().await;

        if !self.room.is_connected() {
            return Err(VoiceChatError::NotConnected);
        }
        if self.state() != VoiceChatState::Inactive {
            debug!("voice chat already started");
            return Ok(());
        }

        let mode = {
            let mut inner = self.inner();
            if let Some(mode) = config.mode {
                inner.mode = mode;
            }
            inner.mode
        };

        self.set_state(VoiceChatState::Starting);

        let options = MicrophoneOptions {
            device_id: config.device_id.clone(),
            start_muted: config.default_muted || mode == SessionInteractivityMode::PushToTalk,
        };

        match self.room.publish_microphone(&options).await {
            Ok(track) => {
                info!(
                    track_sid = track.sid(),
                    mode = %mode,
                    muted = track.is_muted(),
                    "voice chat started"
                );
                {
                    let mut inner = self.inner();
                    inner.track = Some(track);
                    inner.push_to_talk_started = false;
                }
                self.set_state(VoiceChatState::Active);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to publish microphone");
                self.set_state(VoiceChatState::Inactive);
                Err(e.into())
            }
        }
    }

    /// Unpublishes and releases the microphone. A no-op when inactive.
    pub async fn stop(&self) {
        let _op = self.op_lock.lock().await;

        let (track, push_to_talk_started) = {
            let mut inner = self.inner();
            if inner.state == VoiceChatState::Inactive {
                return;
            }
            let started = std::mem::replace(&mut inner.push_to_talk_started, false);
            (inner.track.take(), started)
        };

        if push_to_talk_started && self.room.is_connected() {
            if let Err(e) = self
                .send_push_to_talk_command(CommandEvent::StopPushToTalk)
                .await
            {
                warn!(error = %e, "failed to close push-to-talk turn on stop");
            }
        }

        if let Some(track) = track {
            if self.room.is_connected() {
                if let Err(e) = self.room.unpublish_track(track.sid()).await {
                    warn!(track_sid = track.sid(), error = %e, "failed to unpublish microphone");
                }
            }
            track.stop().await;
        }

        self.set_state(VoiceChatState::Inactive);
        info!("voice chat stopped");
    }

    pub async fn mute(&self) -> Result<(), VoiceChatError> {
        let _op = self.op_lock.lock().await;
        let track = self.active_track()?;
        track.mute().await?;
        self.emit(VoiceChatEvent::Muted);
        Ok(())
    }

    pub async fn unmute(&self) -> Result<(), VoiceChatError> {
        let _op = self.op_lock.lock().await;
        let track = self.active_track()?;
        track.unmute().await?;
        self.emit(VoiceChatEvent::Unmuted);
        Ok(())
    }

    /// Moves capture to another input device without republishing.
    ///
    /// Returns `false` when the transport could not select the device; the
    /// previous device stays in use.
    pub async fn set_device(&self, device_id: &str) -> Result<bool, VoiceChatError> {
        let _op = self.op_lock.lock().await;
        let track = self.active_track()?;
        let switched = track.switch_device(device_id).await?;
        if switched {
            info!(device_id, "microphone device changed");
            self.emit(VoiceChatEvent::DeviceChanged(device_id.to_string()));
        } else {
            warn!(device_id, "microphone device could not be selected");
        }
        Ok(switched)
    }

    /// Opens a push-to-talk turn: signals the avatar, then unmutes.
    pub async fn start_push_to_talk(&self) -> Result<(), VoiceChatError> {
        let _op = self.op_lock.lock().await;
        let track = self.active_track()?;
        self.require_push_to_talk()?;
        if self.is_push_to_talk_started() {
            return Ok(());
        }

        self.send_push_to_talk_command(CommandEvent::StartPushToTalk)
            .await?;
        if let Err(e) = track.unmute().await {
            // The avatar already saw the turn open; close it again.
            warn!(error = %e, "failed to unmute for push-to-talk");
            if let Err(close_err) = self
                .send_push_to_talk_command(CommandEvent::StopPushToTalk)
                .await
            {
                warn!(error = %close_err, "failed to close push-to-talk turn");
            }
            return Err(e.into());
        }
        self.inner().push_to_talk_started = true;
        self.emit(VoiceChatEvent::Unmuted);
        Ok(())
    }

    /// Closes a push-to-talk turn: mutes, then signals the avatar.
    pub async fn stop_push_to_talk(&self) -> Result<(), VoiceChatError> {
        let _op = self.op_lock.lock().await;
        let track = self.active_track()?;
        self.require_push_to_talk()?;
        if !self.is_push_to_talk_started() {
            return Ok(());
        }

        track.mute().await?;
        self.emit(VoiceChatEvent::Muted);
        self.inner().push_to_talk_started = false;
        self.send_push_to_talk_command(CommandEvent::StopPushToTalk)
            .await?;
        Ok(())
    }

    async fn send_push_to_talk_command(&self, event: CommandEvent) -> Result<(), VoiceChatError> {
        let session_id = self.inner().session_id.clone();
        let payload = CommandMessage::new(event, session_id).to_bytes()?;
        self.room.publish_data(payload, COMMAND_TOPIC, true).await?;
        debug!(event = %event, "sent push-to-talk command");
        Ok(())
    }

    fn active_track(&self) -> Result<Arc<dyn LocalAudioTrack>, VoiceChatError> {
        let inner = self.inner();
        match (&inner.state, &inner.track) {
            (VoiceChatState::Active, Some(track)) => Ok(Arc::clone(track)),
            _ => Err(VoiceChatError::NotActive),
        }
    }

    fn require_push_to_talk(&self) -> Result<(), VoiceChatError> {
        let actual = self.mode();
        if actual == SessionInteractivityMode::PushToTalk {
            Ok(())
        } else {
            Err(VoiceChatError::WrongMode {
                expected: SessionInteractivityMode::PushToTalk,
                actual,
            })
        }
    }
}
