//! Seon Server entry point.

mod config;

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use seon_http::AppState;
use seon_http::state::InvalidOrigin;
use seon_service::ServiceState;
use seon_service::sweeper::Sweeper;
use seon_service::upstream::{UpstreamError, Verifier};
use seon_upstream::{GeminiCompletion, RecaptchaVerifier};

use config::Config;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("invalid host: {0}")]
    Host(#[from] std::net::AddrParseError),

    #[error(transparent)]
    Cors(#[from] InvalidOrigin),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] UpstreamError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Seon Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let ai_client = seon_upstream::http_client(Duration::from_secs(config.ai_timeout))?;
    let completion = Arc::new(GeminiCompletion::new(ai_client, config.gemini_config()));

    let verifier: Option<Arc<dyn Verifier>> = match config.recaptcha_config() {
        Some(rc) => {
            let client = seon_upstream::http_client(Duration::from_secs(config.verify_timeout))?;
            let verifier: Arc<dyn Verifier> = Arc::new(RecaptchaVerifier::new(client, rc));
            Some(verifier)
        }
        None => {
            tracing::warn!("No verification secret configured, tokens will not be checked");
            None
        }
    };

    let service = ServiceState::new(&config.service_config(), completion, verifier);
    let state = AppState::new(service.clone(), &config.cors_origins)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.ai_model,
        rate_limit = config.rate_limit,
        cache_capacity = config.cache_capacity,
        "Seon Server starting",
    );

    let app = seon_http::router(state);

    let host: IpAddr = config.host.parse()?;
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    let sweeper = Sweeper::start(service, config.sweep_intervals());

    tracing::info!(%addr, "Seon Server ready");

    let served = seon_http::serve(listener, app, shutdown_signal()).await;
    sweeper.stop().await;
    served.map_err(StartupError::Serve)?;

    tracing::info!("Seon Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
