use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream answered with a non-success status. `body` is the raw
    /// response text.
    #[error("{body}")]
    Upstream { status: u16, body: String },

    #[error("invalid upstream response: {0}")]
    Decode(String),

    #[error("upstream response missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}
