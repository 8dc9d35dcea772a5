//! LiveAvatar token proxy binary.
//!
//! Usage: `liveavatar-server [config.toml]`. Every setting can also come from
//! the environment; see [`config::apply_env_overrides`].

use liveavatar_api::ApiError;
use liveavatar_server::config::{self, Config, ConfigError, LoggingConfig};
use liveavatar_server::{app, AppState};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] ApiError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Warns about settings the upstream API will reject at request time.
fn report_upstream(config: &Config) {
    let heygen = &config.heygen;
    if heygen.api_key.is_empty() {
        tracing::warn!("HEYGEN_API_KEY is not set; token requests will fail");
    }
    if heygen.avatar_id.is_empty() {
        tracing::warn!("HEYGEN_AVATAR_ID is not set; the upstream API will reject sessions");
    }
    tracing::info!(
        api_url = %heygen.api_url,
        avatar_id = %heygen.avatar_id,
        sandbox = heygen.is_sandbox,
        custom_mode_keys = config.custom.is_configured(),
        "upstream configured"
    );
}

async fn run() -> Result<(), StartupError> {
    let (path, source) =
        config::resolve_config_path(std::env::args().nth(1), |key| std::env::var(key).ok());
    let config = config::load_config(Some(&path))?;

    init_tracing(&config.logging);
    tracing::info!(source = source.as_str(), %path, "loaded configuration");
    report_upstream(&config);

    let state = AppState::from_config(&config.heygen)?;
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    tracing::info!(%addr, "token proxy listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("token proxy shut down");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Tracing may not be initialised yet when configuration fails.
        eprintln!("liveavatar-server: {e}");
        std::process::exit(1);
    }
}

/// Resolves on SIGINT or SIGTERM. A signal handler that cannot be
/// installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "shutting down, draining in-flight requests");
}
