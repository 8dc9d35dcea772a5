use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{Envelope, SessionStart, SessionToken, SessionTokenRequest, Validate};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const TOKEN_PATH: &str = "/v1/sessions/token";
const START_PATH: &str = "/v1/sessions/start";
const STOP_PATH: &str = "/v1/sessions/stop";
const KEEP_ALIVE_PATH: &str = "/v1/sessions/keep-alive";

/// Async client for the session endpoints of the LiveAvatar API.
///
/// Holds one pooled `reqwest::Client`; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LiveAvatarClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl LiveAvatarClient {
    /// # Errors
    ///
    /// `Network` if the HTTP client cannot be built (TLS backend setup).
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("liveavatar/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &str {
        &self.config.url
    }

    /// Whether an account API key is configured. Without one only the
    /// bearer-authenticated calls can succeed.
    pub fn has_api_key(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Requests a new session token. Authenticated with the account API key.
    pub async fn create_session_token(
        &self,
        request: &SessionTokenRequest,
    ) -> Result<SessionToken, ApiError> {
        if !self.has_api_key() {
            return Err(ApiError::Config("API key is not configured".to_string()));
        }

        debug!(
            mode = %request.mode,
            avatar_id = %request.avatar_id,
            sandbox = request.is_sandbox,
            "requesting session token"
        );

        let resp = self
            .http
            .post(self.config.endpoint(TOKEN_PATH))
            .header("X-API-KEY", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        read_data(resp).await
    }

    /// Starts the session identified by `session_token` and returns the media
    /// room credentials.
    pub async fn start_session(&self, session_token: &str) -> Result<SessionStart, ApiError> {
        let resp = self.bearer_post(START_PATH, session_token).await?;
        let start: SessionStart = read_data(resp).await?;
        debug!(session_id = %start.session_id, "session started upstream");
        Ok(start)
    }

    /// Ends the session. The service releases the avatar immediately.
    pub async fn stop_session(&self, session_token: &str) -> Result<(), ApiError> {
        let resp = self.bearer_post(STOP_PATH, session_token).await?;
        check_status(resp).await
    }

    /// Resets the session's idle timer.
    pub async fn keep_alive(&self, session_token: &str) -> Result<(), ApiError> {
        let resp = self.bearer_post(KEEP_ALIVE_PATH, session_token).await?;
        check_status(resp).await
    }

    async fn bearer_post(
        &self,
        path: &str,
        session_token: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let resp = self
            .http
            .post(self.config.endpoint(path))
            .bearer_auth(session_token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Ok(resp)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<(), ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status = status.as_u16(), error = %e, "failed to read upstream error body");
            format!("upstream returned {status}")
        }
    };
    warn!(status = status.as_u16(), "upstream call failed");
    Err(ApiError::Upstream {
        status: status.as_u16(),
        body,
    })
}

async fn read_data<T>(resp: reqwest::Response) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate,
{
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "upstream call failed");
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
    let data = envelope.data.ok_or(ApiError::MissingField("data"))?;
    data.validate()?;
    Ok(data)
}
