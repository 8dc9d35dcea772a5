//! Avatar session lifecycle.
//!
//! An [`AvatarSession`] turns a session token into a live conversation:
//! it starts the session upstream, joins the media room with the returned
//! credentials, watches the room for the avatar's tracks and data-channel
//! events, and optionally starts voice chat once connected.

use crate::error::SessionError;
use crate::room::{MediaRoom, RemoteTrack, RoomEvent, TrackKind};
use crate::voice_chat::{VoiceChat, VoiceChatConfig};
use liveavatar_api::LiveAvatarClient;
use liveavatar_types::{
    CommandEvent, CommandMessage, ConnectionQuality, ServerEvent, ServerMessage, SessionMode,
    SessionState, COMMAND_TOPIC, RESPONSE_TOPIC,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity for the session event broadcast channel.
const DEFAULT_SESSION_EVENT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Session flavour. Decides which avatar commands are available and the
    /// default voice chat interactivity.
    pub mode: SessionMode,
    /// Voice chat to start once connected; `None` leaves the microphone off.
    pub voice_chat: Option<VoiceChatConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Full,
            voice_chat: Some(VoiceChatConfig::default()),
        }
    }
}

/// The avatar's subscribed media, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub video: RemoteTrack,
    pub audio: RemoteTrack,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Both avatar tracks are subscribed.
    StreamReady,
    /// An avatar track went away after the stream was ready.
    StreamDisconnected,
    ConnectionQualityChanged(ConnectionQuality),
    AvatarSpeakStarted,
    AvatarSpeakEnded,
    UserSpeakStarted,
    UserSpeakEnded,
    AvatarTranscription(String),
    UserTranscription(String),
    /// The service ended the session.
    SessionStopped,
    /// A data-channel event this crate does not interpret.
    Other(ServerMessage),
}

#[derive(Debug, Default)]
struct Status {
    state: SessionState,
    session_id: Option<String>,
    video: Option<RemoteTrack>,
    audio: Option<RemoteTrack>,
    stream_ready: bool,
    quality: ConnectionQuality,
    avatar_talking: bool,
    user_talking: bool,
}

struct Shared {
    session_token: String,
    config: SessionConfig,
    api: Arc<LiveAvatarClient>,
    room: Arc<dyn MediaRoom>,
    voice_chat: Arc<VoiceChat>,
    status: Mutex<Status>,
    events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: SessionState) {
        let changed = {
            let mut status = self.status();
            let changed = status.state != state;
            status.state = state;
            changed
        };
        if changed {
            info!(state = %state, "session state changed");
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn on_track_subscribed(&self, track: RemoteTrack) {
        let ready = {
            let mut status = self.status();
            match track.kind {
                TrackKind::Video => status.video = Some(track),
                TrackKind::Audio => status.audio = Some(track),
            }
            let ready = !status.stream_ready && status.video.is_some() && status.audio.is_some();
            if ready {
                status.stream_ready = true;
            }
            ready
        };
        if ready {
            info!("avatar stream ready");
            self.emit(SessionEvent::StreamReady);
        }
    }

    fn on_track_unsubscribed(&self, track: &RemoteTrack) {
        let lost = {
            let mut status = self.status();
            let slot = match track.kind {
                TrackKind::Video => &mut status.video,
                TrackKind::Audio => &mut status.audio,
            };
            if slot.as_ref().is_some_and(|t| t.sid == track.sid) {
                *slot = None;
            }
            let lost = status.stream_ready && (status.video.is_none() || status.audio.is_none());
            if lost {
                status.stream_ready = false;
            }
            lost
        };
        if lost {
            warn!(track_sid = %track.sid, "avatar stream lost a track");
            self.emit(SessionEvent::StreamDisconnected);
        }
    }

    fn on_quality(&self, quality: ConnectionQuality) {
        let changed = {
            let mut status = self.status();
            let changed = status.quality != quality;
            status.quality = quality;
            changed
        };
        if changed {
            debug!(quality = %quality, "connection quality changed");
            self.emit(SessionEvent::ConnectionQualityChanged(quality));
        }
    }

    fn on_data(&self, topic: Option<&str>, payload: &[u8]) {
        if topic.is_some_and(|t| t != RESPONSE_TOPIC) {
            return;
        }
        let message = match ServerMessage::from_bytes(payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "ignoring undecodable data message");
                return;
            }
        };

        let event = match message.event() {
            Some(ServerEvent::UserSpeakStarted) => {
                self.status().user_talking = true;
                SessionEvent::UserSpeakStarted
            }
            Some(ServerEvent::UserSpeakEnded) => {
                self.status().user_talking = false;
                SessionEvent::UserSpeakEnded
            }
            Some(ServerEvent::AvatarSpeakStarted) => {
                self.status().avatar_talking = true;
                SessionEvent::AvatarSpeakStarted
            }
            Some(ServerEvent::AvatarSpeakEnded) => {
                self.status().avatar_talking = false;
                SessionEvent::AvatarSpeakEnded
            }
            Some(ServerEvent::UserTranscription) => {
                SessionEvent::UserTranscription(message.text.unwrap_or_default())
            }
            Some(ServerEvent::AvatarTranscription) => {
                SessionEvent::AvatarTranscription(message.text.unwrap_or_default())
            }
            Some(ServerEvent::SessionStopped) => SessionEvent::SessionStopped,
            None => SessionEvent::Other(message),
        };
        self.emit(event);
    }

    /// Remote side closed the room.
    async fn on_disconnected(&self, reason: Option<String>) {
        info!(reason = reason.as_deref().unwrap_or("unknown"), "room disconnected");
        self.voice_chat.stop().await;
        self.clear_media();
        self.set_state(SessionState::Disconnected);
    }

    fn clear_media(&self) {
        let mut status = self.status();
        status.video = None;
        status.audio = None;
        status.stream_ready = false;
        status.avatar_talking = false;
        status.user_talking = false;
    }
}

/// Drains room events into session state until the room closes.
async fn pump_room_events(shared: Arc<Shared>, mut rx: broadcast::Receiver<RoomEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session lagged behind room events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            RoomEvent::TrackSubscribed(track) => shared.on_track_subscribed(track),
            RoomEvent::TrackUnsubscribed(track) => shared.on_track_unsubscribed(&track),
            RoomEvent::DataReceived { topic, payload, .. } => {
                shared.on_data(topic.as_deref(), &payload)
            }
            RoomEvent::ConnectionQualityChanged(quality) => shared.on_quality(quality),
            RoomEvent::Reconnecting => info!("room reconnecting"),
            RoomEvent::Reconnected => info!("room reconnected"),
            RoomEvent::Disconnected { reason } => {
                shared.on_disconnected(reason).await;
                break;
            }
        }
    }
}

pub struct AvatarSession {
    shared: Arc<Shared>,
    pump: Mutex<Option<JoinHandle<()>>>,
    /// Serialises start/stop.
    op_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for AvatarSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarSession")
            .field("state", &self.state())
            .field("mode", &self.shared.config.mode)
            .finish_non_exhaustive()
    }
}

impl AvatarSession {
    pub fn new(
        session_token: impl Into<String>,
        api: Arc<LiveAvatarClient>,
        room: Arc<dyn MediaRoom>,
        config: SessionConfig,
    ) -> Self {
        let voice_chat = Arc::new(VoiceChat::new(Arc::clone(&room)));
        voice_chat.set_mode(config.mode.interactivity());
        let (events, _) = broadcast::channel(DEFAULT_SESSION_EVENT_BROADCAST_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                session_token: session_token.into(),
                config,
                api,
                room,
                voice_chat,
                status: Mutex::new(Status::default()),
                events,
            }),
            pump: Mutex::new(None),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.shared.status().state
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.status().session_id.clone()
    }

    pub fn mode(&self) -> SessionMode {
        self.shared.config.mode
    }

    pub fn voice_chat(&self) -> Arc<VoiceChat> {
        Arc::clone(&self.shared.voice_chat)
    }

    pub fn is_stream_ready(&self) -> bool {
        self.shared.status().stream_ready
    }

    /// The avatar's video and audio tracks, once both are subscribed.
    pub fn remote_stream(&self) -> Option<RemoteStream> {
        let status = self.shared.status();
        if !status.stream_ready {
            return None;
        }
        Some(RemoteStream {
            video: status.video.clone()?,
            audio: status.audio.clone()?,
        })
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        self.shared.status().quality
    }

    pub fn is_avatar_talking(&self) -> bool {
        self.shared.status().avatar_talking
    }

    pub fn is_user_talking(&self) -> bool {
        self.shared.status().user_talking
    }

    fn require_state(&self, expected: SessionState) -> Result<(), SessionError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState { expected, actual })
        }
    }

    /// Starts the session upstream and joins the media room.
    ///
    /// Voice chat is started afterwards when configured; a voice chat failure
    /// is logged and leaves the session connected.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the session is `INACTIVE`. Upstream or room
    /// failures move the session to `DISCONNECTED`.
    pub async fn start(&self) -> Result<(), SessionError> {
        let _op = self.op_lock.lock().await;
        self.require_state(SessionState::Inactive)?;

        let shared = &self.shared;
        shared.set_state(SessionState::Connecting);

        // Subscribe before joining so no early track event is missed.
        let rx = shared.room.subscribe();

        let start = match shared.api.start_session(&shared.session_token).await {
            Ok(start) => start,
            Err(e) => {
                warn!(error = %e, "failed to start session upstream");
                shared.set_state(SessionState::Disconnected);
                return Err(e.into());
            }
        };

        if let Err(e) = shared
            .room
            .connect(&start.livekit_url, &start.livekit_client_token)
            .await
        {
            warn!(error = %e, session_id = %start.session_id, "failed to join media room");
            if let Err(stop_err) = shared.api.stop_session(&shared.session_token).await {
                warn!(error = %stop_err, "failed to release upstream session");
            }
            shared.set_state(SessionState::Disconnected);
            return Err(e.into());
        }

        shared.status().session_id = Some(start.session_id.clone());
        shared
            .voice_chat
            .set_session_id(Some(start.session_id.clone()));

        let handle = tokio::spawn(pump_room_events(Arc::clone(shared), rx));
        *self.pump.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        shared.set_state(SessionState::Connected);
        info!(session_id = %start.session_id, "avatar session connected");

        if let Some(voice_config) = shared.config.voice_chat.clone() {
            if let Err(e) = shared.voice_chat.start(voice_config).await {
                warn!(error = %e, "voice chat failed to start");
            }
        }

        Ok(())
    }

    /// Ends the session: stops voice chat, releases the upstream session and
    /// leaves the room. Stopping a stopped session is a no-op.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let _op = self.op_lock.lock().await;
        let shared = &self.shared;

        match self.state() {
            SessionState::Disconnected => return Ok(()),
            SessionState::Inactive => {
                shared.set_state(SessionState::Disconnected);
                return Ok(());
            }
            _ => {}
        }

        shared.set_state(SessionState::Disconnecting);
        shared.voice_chat.stop().await;

        let pump = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = pump {
            handle.abort();
        }

        if let Err(e) = shared.api.stop_session(&shared.session_token).await {
            warn!(error = %e, "failed to stop session upstream");
        }
        shared.room.disconnect().await;
        shared.clear_media();
        shared.set_state(SessionState::Disconnected);
        Ok(())
    }

    /// Resets the upstream idle timer.
    pub async fn keep_alive(&self) -> Result<(), SessionError> {
        self.require_state(SessionState::Connected)?;
        self.shared
            .api
            .keep_alive(&self.shared.session_token)
            .await?;
        Ok(())
    }

    /// Sends user text; the avatar answers through its own pipeline.
    pub async fn message(&self, text: &str) -> Result<(), SessionError> {
        self.send_command(CommandEvent::SpeakResponse, Some(text))
            .await
    }

    /// Makes the avatar say `text` verbatim.
    pub async fn repeat(&self, text: &str) -> Result<(), SessionError> {
        self.send_command(CommandEvent::SpeakText, Some(text)).await
    }

    pub async fn interrupt(&self) -> Result<(), SessionError> {
        self.send_command(CommandEvent::Interrupt, None).await
    }

    pub async fn start_listening(&self) -> Result<(), SessionError> {
        self.send_command(CommandEvent::StartListening, None).await
    }

    pub async fn stop_listening(&self) -> Result<(), SessionError> {
        self.send_command(CommandEvent::StopListening, None).await
    }

    async fn send_command(&self, event: CommandEvent, text: Option<&str>) -> Result<(), SessionError> {
        self.require_state(SessionState::Connected)?;

        // Custom sessions have no hosted speech recognition or LLM.
        let mode = self.shared.config.mode.actions_mode();
        if mode == SessionMode::Custom
            && matches!(
                event,
                CommandEvent::SpeakResponse
                    | CommandEvent::StartListening
                    | CommandEvent::StopListening
            )
        {
            return Err(SessionError::Unsupported(mode));
        }

        let mut command = CommandMessage::new(event, self.session_id());
        if let Some(text) = text {
            command = command.with_text(text);
        }
        self.shared
            .room
            .publish_data(command.to_bytes()?, COMMAND_TOPIC, true)
            .await?;
        debug!(event = %event, "sent avatar command");
        Ok(())
    }
}

impl Drop for AvatarSession {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}
