use liveavatar_api::{ApiConfig, LiveAvatarClient};
use liveavatar_client::{
    AvatarSession, LoopbackRoom, MediaRoom, RemoteTrack, RoomEvent, SessionConfig, SessionError,
    SessionEvent, TrackKind, VoiceChatConfig,
};
use liveavatar_types::{
    ConnectionQuality, SessionMode, SessionState, VoiceChatState, COMMAND_TOPIC, RESPONSE_TOPIC,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION_TOKEN: &str = "session-token-1";

async fn mock_start(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/sessions/start"))
        .and(header("Authorization", "Bearer session-token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1000,
            "data": {
                "session_id": "sess-1",
                "livekit_url": "wss://livekit.test",
                "livekit_client_token": "lk-token"
            }
        })))
        .mount(server)
        .await;
}

async fn mock_stop(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/sessions/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1000 })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn session(server: &MockServer, room: &Arc<LoopbackRoom>, config: SessionConfig) -> AvatarSession {
    let api = Arc::new(LiveAvatarClient::new(ApiConfig::new(server.uri(), "key")).unwrap());
    AvatarSession::new(SESSION_TOKEN, api, room.clone(), config)
}

fn remote(sid: &str, kind: TrackKind) -> RemoteTrack {
    RemoteTrack {
        sid: sid.to_string(),
        kind,
        participant_identity: "heygen".to_string(),
    }
}

fn server_event(body: Value) -> RoomEvent {
    RoomEvent::DataReceived {
        topic: Some(RESPONSE_TOPIC.to_string()),
        payload: serde_json::to_vec(&body).unwrap(),
        participant_identity: Some("heygen".to_string()),
    }
}

async fn wait_for(rx: &mut broadcast::Receiver<SessionEvent>, expected: SessionEvent) {
    let found = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if event == expected => return,
                Ok(_) => continue,
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    })
    .await;
    assert!(found.is_ok(), "timed out waiting for {expected:?}");
}

#[tokio::test]
async fn test_start_connects_room_and_starts_voice_chat() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());
    let mut rx = session.subscribe();

    assert_eq!(session.state(), SessionState::Inactive);
    session.start().await.expect("start should succeed");

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.session_id().as_deref(), Some("sess-1"));
    assert_eq!(
        room.credentials(),
        Some(("wss://livekit.test".to_string(), "lk-token".to_string()))
    );
    assert_eq!(session.voice_chat().state(), VoiceChatState::Active);

    assert_eq!(
        rx.try_recv().unwrap(),
        SessionEvent::StateChanged(SessionState::Connecting)
    );
    assert_eq!(
        rx.try_recv().unwrap(),
        SessionEvent::StateChanged(SessionState::Connected)
    );
}

#[tokio::test]
async fn test_start_without_voice_chat() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(
        &server,
        &room,
        SessionConfig {
            mode: SessionMode::Full,
            voice_chat: None,
        },
    );

    session.start().await.unwrap();
    assert_eq!(session.voice_chat().state(), VoiceChatState::Inactive);
    assert!(room.published_tracks().is_empty());
}

#[tokio::test]
async fn test_voice_chat_failure_keeps_session_connected() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    room.deny_microphone(Some("no microphone".into()));
    let session = session(&server, &room, SessionConfig::default());

    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.voice_chat().state(), VoiceChatState::Inactive);
}

#[tokio::test]
async fn test_push_to_talk_mode_publishes_muted() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(
        &server,
        &room,
        SessionConfig {
            mode: SessionMode::FullPtt,
            voice_chat: Some(VoiceChatConfig::default()),
        },
    );

    session.start().await.unwrap();
    let voice = session.voice_chat();
    assert!(voice.is_muted());

    voice.start_push_to_talk().await.unwrap();
    let sent = room.sent_data();
    let command: Value = serde_json::from_slice(&sent[0].payload).unwrap();
    assert_eq!(command["event_type"], "user.start_push_to_talk");
    assert_eq!(command["session_id"], "sess-1");
}

#[tokio::test]
async fn test_upstream_start_failure_disconnects() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/start"))
        .respond_with(ResponseTemplate::new(500).set_body_string("no capacity"))
        .mount(&server)
        .await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, SessionError::Api(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!room.is_connected());
}

#[tokio::test]
async fn test_room_failure_releases_upstream_session() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    mock_stop(&server, 1).await;
    let room = Arc::new(LoopbackRoom::new());
    room.fail_next_connect("ice failed");
    let session = session(&server, &room, SessionConfig::default());

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, SessionError::Room(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());

    session.start().await.unwrap();
    let err = session.start().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            expected: SessionState::Inactive,
            actual: SessionState::Connected,
        }
    ));
}

#[tokio::test]
async fn test_stream_ready_after_both_tracks() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());
    let mut rx = session.subscribe();
    session.start().await.unwrap();

    room.emit(RoomEvent::TrackSubscribed(remote("TR_video", TrackKind::Video)));
    room.emit(RoomEvent::TrackSubscribed(remote("TR_audio", TrackKind::Audio)));
    wait_for(&mut rx, SessionEvent::StreamReady).await;

    assert!(session.is_stream_ready());
    let stream = session.remote_stream().expect("stream should be ready");
    assert_eq!(stream.video.sid, "TR_video");
    assert_eq!(stream.audio.sid, "TR_audio");

    room.emit(RoomEvent::TrackUnsubscribed(remote("TR_video", TrackKind::Video)));
    wait_for(&mut rx, SessionEvent::StreamDisconnected).await;
    assert!(!session.is_stream_ready());
    assert!(session.remote_stream().is_none());
}

#[tokio::test]
async fn test_video_alone_is_not_ready() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());
    let mut rx = session.subscribe();
    session.start().await.unwrap();

    room.emit(RoomEvent::TrackSubscribed(remote("TR_video", TrackKind::Video)));
    room.emit(RoomEvent::ConnectionQualityChanged(ConnectionQuality::Good));
    wait_for(
        &mut rx,
        SessionEvent::ConnectionQualityChanged(ConnectionQuality::Good),
    )
    .await;

    assert!(!session.is_stream_ready());
    assert_eq!(session.connection_quality(), ConnectionQuality::Good);
}

#[tokio::test]
async fn test_server_events_update_talking_flags() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());
    let mut rx = session.subscribe();
    session.start().await.unwrap();

    room.emit(server_event(json!({ "event_type": "avatar.speak_started" })));
    wait_for(&mut rx, SessionEvent::AvatarSpeakStarted).await;
    assert!(session.is_avatar_talking());

    room.emit(server_event(json!({ "event_type": "user.speak_started" })));
    wait_for(&mut rx, SessionEvent::UserSpeakStarted).await;
    assert!(session.is_user_talking());

    room.emit(server_event(
        json!({ "event_type": "user.transcription", "text": "hello avatar" }),
    ));
    wait_for(&mut rx, SessionEvent::UserTranscription("hello avatar".into())).await;

    room.emit(server_event(json!({ "event_type": "avatar.speak_ended" })));
    wait_for(&mut rx, SessionEvent::AvatarSpeakEnded).await;
    assert!(!session.is_avatar_talking());
}

#[tokio::test]
async fn test_unknown_and_foreign_data_messages() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());
    session.start().await.unwrap();
    let mut rx = session.subscribe();

    // Other topics and garbage are ignored.
    room.emit(RoomEvent::DataReceived {
        topic: Some("chat".into()),
        payload: br#"{"event_type":"avatar.speak_started"}"#.to_vec(),
        participant_identity: None,
    });
    room.emit(RoomEvent::DataReceived {
        topic: Some(RESPONSE_TOPIC.into()),
        payload: b"not json".to_vec(),
        participant_identity: None,
    });
    room.emit(server_event(json!({ "event_type": "avatar.gesture", "text": "wave" })));

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event should arrive")
        .unwrap();
    match event {
        SessionEvent::Other(message) => {
            assert_eq!(message.event_type, "avatar.gesture");
            assert_eq!(message.text.as_deref(), Some("wave"));
        }
        other => panic!("expected passthrough event, got {other:?}"),
    }
    assert!(!session.is_avatar_talking());
}

#[tokio::test]
async fn test_remote_disconnect_ends_session() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    mock_stop(&server, 0).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());
    let mut rx = session.subscribe();
    session.start().await.unwrap();

    room.emit(RoomEvent::Disconnected {
        reason: Some("server shutdown".into()),
    });
    wait_for(
        &mut rx,
        SessionEvent::StateChanged(SessionState::Disconnected),
    )
    .await;

    assert_eq!(session.voice_chat().state(), VoiceChatState::Inactive);
    // The session is already over; stop does not call upstream again.
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_releases_everything() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    mock_stop(&server, 1).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());
    session.start().await.unwrap();
    let mut rx = session.subscribe();

    session.stop().await.unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.voice_chat().state(), VoiceChatState::Inactive);
    assert!(!room.is_connected());
    assert!(room.published_tracks().is_empty());
    assert_eq!(
        rx.try_recv().unwrap(),
        SessionEvent::StateChanged(SessionState::Disconnecting)
    );

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_before_start() {
    let server = MockServer::start().await;
    mock_stop(&server, 0).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.start().await.is_err());
}

#[tokio::test]
async fn test_keep_alive() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/keep-alive"))
        .and(header("Authorization", "Bearer session-token-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(&server, &room, SessionConfig::default());

    assert!(matches!(
        session.keep_alive().await,
        Err(SessionError::InvalidState { .. })
    ));
    session.start().await.unwrap();
    session.keep_alive().await.unwrap();
}

#[tokio::test]
async fn test_avatar_commands() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(
        &server,
        &room,
        SessionConfig {
            mode: SessionMode::Full,
            voice_chat: None,
        },
    );

    assert!(matches!(
        session.message("hi").await,
        Err(SessionError::InvalidState { .. })
    ));
    session.start().await.unwrap();

    session.message("what's the weather?").await.unwrap();
    session.repeat("Hello there").await.unwrap();
    session.interrupt().await.unwrap();
    session.start_listening().await.unwrap();
    session.stop_listening().await.unwrap();

    let sent: Vec<Value> = room
        .sent_data()
        .iter()
        .map(|d| {
            assert_eq!(d.topic, COMMAND_TOPIC);
            serde_json::from_slice(&d.payload).unwrap()
        })
        .collect();
    let types: Vec<&str> = sent
        .iter()
        .map(|c| c["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "avatar.speak_response",
            "avatar.speak_text",
            "avatar.interrupt",
            "avatar.start_listening",
            "avatar.stop_listening",
        ]
    );
    assert_eq!(sent[0]["text"], "what's the weather?");
    assert_eq!(sent[0]["session_id"], "sess-1");
    assert_eq!(sent[1]["text"], "Hello there");
    assert!(sent[2].get("text").is_none());
}

#[tokio::test]
async fn test_custom_mode_has_no_hosted_pipeline() {
    let server = MockServer::start().await;
    mock_start(&server).await;
    let room = Arc::new(LoopbackRoom::new());
    let session = session(
        &server,
        &room,
        SessionConfig {
            mode: SessionMode::Custom,
            voice_chat: None,
        },
    );
    session.start().await.unwrap();

    assert!(matches!(
        session.message("hi").await,
        Err(SessionError::Unsupported(SessionMode::Custom))
    ));
    assert!(matches!(
        session.start_listening().await,
        Err(SessionError::Unsupported(SessionMode::Custom))
    ));
    session.repeat("scripted line").await.unwrap();
    session.interrupt().await.unwrap();
    assert_eq!(room.sent_data().len(), 2);
}
