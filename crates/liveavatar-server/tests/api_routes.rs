use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use liveavatar_api::{ApiConfig, AvatarPersona, LiveAvatarClient};
use liveavatar_server::{app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn upstream_client(url: impl Into<String>) -> Arc<LiveAvatarClient> {
    Arc::new(LiveAvatarClient::new(ApiConfig::new(url, "server-key")).unwrap())
}

fn state_for(server: &MockServer, is_sandbox: bool) -> AppState {
    AppState {
        api: upstream_client(server.uri()),
        avatar_id: "avatar-1".to_string(),
        persona: AvatarPersona {
            voice_id: "voice-1".to_string(),
            context_id: "context-1".to_string(),
            language: "en".to_string(),
        },
        is_sandbox,
    }
}

async fn post(app: Router, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn mock_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/sessions/token"))
        .and(header("X-API-KEY", "server-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1000,
            "data": { "session_id": "sess-1", "session_token": "tok-1" }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn health_check_returns_ok() {
    let server = MockServer::start().await;
    let response = app(state_for(&server, false))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn get_livekit_token_returns_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/token"))
        .and(body_partial_json(json!({
            "mode": "FULL",
            "avatar_id": "avatar-1",
            "avatar_persona": { "voice_id": "voice-1", "context_id": "context-1", "language": "en" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "session_id": "sess-1", "session_token": "tok-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/start"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "session_id": "sess-1",
                "livekit_url": "wss://livekit.example.com",
                "livekit_client_token": "lk-token"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, json) = post(app(state_for(&server, false)), "/api/get-livekit-token", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "url": "wss://livekit.example.com",
            "token": "lk-token",
            "sessionId": "sess-1"
        })
    );
}

#[tokio::test]
async fn get_livekit_token_reports_token_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/start"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (status, json) = post(app(state_for(&server, false)), "/api/get-livekit-token", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to get token: unauthorized");
}

#[tokio::test]
async fn get_livekit_token_reports_start_failure() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/start"))
        .respond_with(ResponseTemplate::new(503).set_body_string("no avatars available"))
        .mount(&server)
        .await;

    let (status, json) = post(app(state_for(&server, false)), "/api/get-livekit-token", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to start session: no avatars available");
}

#[tokio::test]
async fn get_livekit_token_rejects_blank_credentials() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "session_id": "sess-1", "livekit_url": "wss://lk", "livekit_client_token": "" }
        })))
        .mount(&server)
        .await;

    let (status, json) = post(app(state_for(&server, false)), "/api/get-livekit-token", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("Failed to start session:"), "got {error}");
    assert!(error.contains("livekit_client_token"));
}

#[tokio::test]
async fn get_livekit_token_unreachable_upstream() {
    let server = MockServer::start().await;
    let state = AppState {
        api: upstream_client("http://127.0.0.1:1"),
        ..state_for(&server, false)
    };

    let (status, json) = post(app(state), "/api/get-livekit-token", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to get token: network error"));
}

#[tokio::test]
async fn start_session_returns_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "session_id": "sess-1", "session_token": "tok-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, json) = post(
        app(state_for(&server, false)),
        "/api/start-session",
        Some(json!({ "pushToTalk": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "session_token": "tok-1" }));

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(sent.get("interactivity_type").is_none());
    assert!(sent.get("is_sandbox").is_none());
}

#[tokio::test]
async fn start_session_push_to_talk_in_sandbox() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/token"))
        .and(body_partial_json(json!({
            "interactivity_type": "PUSH_TO_TALK",
            "is_sandbox": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "session_id": "sess-2", "session_token": "tok-2" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, json) = post(
        app(state_for(&server, true)),
        "/api/start-session",
        Some(json!({ "pushToTalk": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session_token"], "tok-2");
}

#[tokio::test]
async fn start_session_accepts_empty_body() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    let (status, json) = post(app(state_for(&server, false)), "/api/start-session", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session_token"], "tok-1");
}

#[tokio::test]
async fn start_session_rejects_malformed_body() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .uri("/api/start-session")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app(state_for(&server, false)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn start_session_reports_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("avatar not found"))
        .mount(&server)
        .await;

    let (status, json) = post(
        app(state_for(&server, false)),
        "/api/start-session",
        Some(json!({ "pushToTalk": false })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to get token: avatar not found");
}

#[tokio::test]
async fn stop_session_and_keep_alive_forward_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/stop"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/keep-alive"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("expired"))
        .expect(1)
        .mount(&server)
        .await;

    let (status, json) = post(
        app(state_for(&server, false)),
        "/api/stop-session",
        Some(json!({ "session_token": "tok-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "ok": true }));

    let (status, json) = post(
        app(state_for(&server, false)),
        "/api/keep-alive",
        Some(json!({ "session_token": "tok-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to keep session alive: expired");
}

#[tokio::test]
async fn stop_session_requires_token() {
    let server = MockServer::start().await;

    let (status, json) = post(app(state_for(&server, false)), "/api/stop-session", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid input: session_token is required");
}
