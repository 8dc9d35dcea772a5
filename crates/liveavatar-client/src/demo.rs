//! View state of the demo front end.
//!
//! The demo shows an idle screen with a start button until the token proxy
//! hands back a session token, then a session screen that stays up until the
//! session reports `DISCONNECTED`. [`DemoView`] is that logic as a reducer,
//! free of any rendering.

use crate::voice_chat::VoiceChatConfig;
use liveavatar_types::{SessionMode, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoAction {
    /// The user pressed start; a token request is in flight.
    StartRequested { push_to_talk: bool },
    /// The token proxy answered `{session_token}`.
    TokenReceived {
        session_token: String,
        push_to_talk: bool,
    },
    /// The token proxy answered `{error}` or could not be reached.
    RequestFailed(String),
    DismissError,
    /// The session reported its avatar stream as ready.
    StreamReady,
    SessionStateChanged(SessionState),
}

/// Which layer the demo renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Idle,
    /// Session token set, avatar stream not yet ready. The idle layer stays
    /// visible with a spinner over it.
    Connecting,
    Session,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoView {
    session_token: String,
    mode: SessionMode,
    error: Option<String>,
    stream_ready: bool,
    is_loading: bool,
}

impl DemoView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: DemoAction) {
        match action {
            DemoAction::StartRequested { .. } => {
                self.is_loading = true;
            }
            DemoAction::TokenReceived {
                session_token,
                push_to_talk,
            } => {
                self.session_token = session_token;
                self.mode = if push_to_talk {
                    SessionMode::FullPtt
                } else {
                    SessionMode::Full
                };
                self.is_loading = false;
            }
            DemoAction::RequestFailed(message) => {
                self.error = Some(message);
                self.is_loading = false;
            }
            DemoAction::DismissError => {
                self.error = None;
            }
            DemoAction::StreamReady => {
                if self.in_session() {
                    self.stream_ready = true;
                }
            }
            DemoAction::SessionStateChanged(SessionState::Disconnected) => {
                self.session_token.clear();
                self.stream_ready = false;
            }
            DemoAction::SessionStateChanged(_) => {}
        }
    }

    /// A session is mounted exactly while the token is non-empty.
    pub fn in_session(&self) -> bool {
        !self.session_token.is_empty()
    }

    pub fn screen(&self) -> Screen {
        match (self.in_session(), self.stream_ready) {
            (false, _) => Screen::Idle,
            (true, false) => Screen::Connecting,
            (true, true) => Screen::Session,
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        self.in_session().then_some(self.session_token.as_str())
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Banner text, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// The start button is enabled only on the idle screen with no request
    /// in flight.
    pub fn can_start(&self) -> bool {
        !self.is_loading && !self.in_session()
    }

    /// Voice chat settings for the session about to be mounted.
    pub fn voice_chat_config(&self) -> VoiceChatConfig {
        VoiceChatConfig {
            mode: Some(self.mode.interactivity()),
            ..VoiceChatConfig::default()
        }
    }
}
