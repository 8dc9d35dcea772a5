//! Server configuration loading from file and environment variables.

use liveavatar_api::{ApiConfig, AvatarPersona, DEFAULT_API_URL};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream LiveAvatar account and avatar persona.
    #[serde(default)]
    pub heygen: HeyGenConfig,

    /// Credentials for `CUSTOM` mode pipelines.
    #[serde(default)]
    pub custom: CustomModeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Upstream account, avatar and `FULL` mode persona.
#[derive(Clone, Deserialize)]
pub struct HeyGenConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub avatar_id: String,

    /// Issue every session in sandbox mode. For integration and development.
    #[serde(default)]
    pub is_sandbox: bool,

    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    #[serde(default = "default_context_id")]
    pub context_id: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Third-party keys a `CUSTOM` mode session would use for its own LLM and
/// TTS. Loaded and reported, not otherwise used by the proxy.
#[derive(Clone, Default, Deserialize)]
pub struct CustomModeConfig {
    #[serde(default)]
    pub elevenlabs_api_key: String,

    #[serde(default)]
    pub openai_api_key: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "liveavatar_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_voice_id() -> String {
    "c2527536-6d1f-4412-a643-53a3497dada9".to_string()
}

fn default_context_id() -> String {
    "5b9dba8a-aa31-11f0-a6ee-066a7fa2e369".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for HeyGenConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_api_url(),
            avatar_id: String::new(),
            is_sandbox: false,
            voice_id: default_voice_id(),
            context_id: default_context_id(),
            language: default_language(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl fmt::Debug for HeyGenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeyGenConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("avatar_id", &self.avatar_id)
            .field("is_sandbox", &self.is_sandbox)
            .field("voice_id", &self.voice_id)
            .field("context_id", &self.context_id)
            .field("language", &self.language)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl fmt::Debug for CustomModeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomModeConfig")
            .field("elevenlabs_api_key", &"[REDACTED]")
            .field("openai_api_key", &"[REDACTED]")
            .finish()
    }
}

impl HeyGenConfig {
    /// Upstream client settings.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            timeout_seconds: self.timeout_seconds,
        }
    }

    pub fn persona(&self) -> AvatarPersona {
        AvatarPersona {
            voice_id: self.voice_id.clone(),
            context_id: self.context_id.clone(),
            language: self.language.clone(),
        }
    }
}

impl CustomModeConfig {
    /// Both keys a custom pipeline needs are present.
    pub fn is_configured(&self) -> bool {
        !self.elevenlabs_api_key.is_empty() && !self.openai_api_key.is_empty()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Config file read when neither the command line nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "LIVEAVATAR_CONFIG_PATH";

/// Where the config file path was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Argument,
    Environment,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Argument => "cli-arg",
            Self::Environment => "env-var",
            Self::Default => "default",
        }
    }
}

/// Picks the config file: the first command line argument, then
/// [`CONFIG_PATH_ENV`], then [`DEFAULT_CONFIG_PATH`]. Blank values are skipped.
pub fn resolve_config_path<F>(argument: Option<String>, lookup: F) -> (String, ConfigSource)
where
    F: Fn(&str) -> Option<String>,
{
    let present = |value: &String| !value.trim().is_empty();

    if let Some(path) = argument.filter(present) {
        (path, ConfigSource::Argument)
    } else if let Some(path) = lookup(CONFIG_PATH_ENV).filter(present) {
        (path, ConfigSource::Environment)
    } else {
        (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
    }
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides (see [`apply_env_overrides`]).
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies environment variable overrides read through `lookup`.
///
/// - `HEYGEN_API_KEY`, `HEYGEN_API_URL`, `HEYGEN_AVATAR_ID`,
///   `HEYGEN_VOICE_ID`, `HEYGEN_CONTEXT_ID`, `HEYGEN_LANGUAGE` override the
///   matching `heygen.*` field
/// - `HEYGEN_IS_SANDBOX` overrides `heygen.is_sandbox` (only "true" enables)
/// - `ELEVENLABS_API_KEY`, `OPENAI_API_KEY` override `custom.*`
/// - `LIVEAVATAR_HOST` / `LIVEAVATAR_PORT` override `server.*`
/// - `LIVEAVATAR_LOG_LEVEL` overrides `logging.level`
/// - `LIVEAVATAR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// Blank values count as unset, so the file or built-in default stays.
/// Unparseable host or port values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let heygen = &mut config.heygen;
    for (key, field) in [
        ("HEYGEN_API_KEY", &mut heygen.api_key),
        ("HEYGEN_API_URL", &mut heygen.api_url),
        ("HEYGEN_AVATAR_ID", &mut heygen.avatar_id),
        ("HEYGEN_VOICE_ID", &mut heygen.voice_id),
        ("HEYGEN_CONTEXT_ID", &mut heygen.context_id),
        ("HEYGEN_LANGUAGE", &mut heygen.language),
        ("ELEVENLABS_API_KEY", &mut config.custom.elevenlabs_api_key),
        ("OPENAI_API_KEY", &mut config.custom.openai_api_key),
    ] {
        if let Some(value) = lookup(key) {
            *field = value;
        }
    }
    if let Some(sandbox) = lookup("HEYGEN_IS_SANDBOX") {
        config.heygen.is_sandbox = sandbox == "true";
    }

    if let Some(host) = lookup("LIVEAVATAR_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("LIVEAVATAR_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = lookup("LIVEAVATAR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("LIVEAVATAR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
