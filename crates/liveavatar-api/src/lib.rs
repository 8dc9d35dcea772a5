//! Client for the hosted LiveAvatar REST API.
//!
//! The service issues short-lived session tokens against an account API key
//! (`X-API-KEY`), then exchanges a session token (`Authorization: Bearer`)
//! for the media room credentials used to join the avatar's LiveKit room.
//!
//! Every upstream response is wrapped in an envelope of the form
//! `{ "code": ..., "data": {...}, "message": ... }`; the client unwraps
//! `data` and rejects responses whose required fields are missing or empty.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::LiveAvatarClient;
pub use config::{ApiConfig, DEFAULT_API_URL};
pub use error::ApiError;
pub use types::{AvatarPersona, SessionStart, SessionToken, SessionTokenRequest};
