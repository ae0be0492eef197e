pub mod utils;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{Config, ConfigError};
use crate::http_server;
use crate::service_state::StateSetupError;
use crate::ServiceState;

const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_FILE_PREFIX: &str = "strata.log";

/// Install the stdout layer, plus a daily rolling file layer when `log_dir`
///  is set. The returned guards flush the writers when dropped.
pub fn init_logging(config: &Config) -> Result<Vec<WorkerGuard>, ConfigError> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let level = config.log_level()?;
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    };
    let mut guards = Vec::new();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(filter());

    let file_layer = match &config.log_dir {
        Some(log_dir) => {
            if let Err(e) = std::fs::create_dir_all(log_dir) {
                eprintln!("cannot create log directory {}: {}", log_dir.display(), e);
            }
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            guards.push(file_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    Ok(guards)
}

/// Run the HTTP server until SIGINT/SIGTERM or until the server itself fails.
pub async fn spawn_service(config: &Config) -> Result<(), ProcessError> {
    let _guards = init_logging(config)?;
    let (signals, stop_tx, stop_rx) = utils::graceful_shutdown_blocker()?;
    let state = ServiceState::from_config(config).await.inspect_err(|e| {
        tracing::error!("error creating server state: {}", e);
    })?;

    let http_config = http_server::Config {
        listen_addr: config.listen_addr,
        log_level: config.log_level()?,
    };
    let server_rx = stop_rx.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = http_server::run(http_config, state, server_rx).await {
            tracing::error!("HTTP server error: {}", e);
            // Nothing left to serve, wake the main task
            let _ = stop_tx.send(());
        }
    });
    tracing::info!(addr = %config.listen_addr, "running");

    let mut stop_rx = stop_rx;
    tokio::select! {
        _ = signals => {}
        _ = stop_rx.changed() => {}
    }
    drain(server, SERVER_DRAIN_TIMEOUT).await
}

/// Wait for the server task to finish its in-flight requests.
async fn drain(server: JoinHandle<()>, limit: Duration) -> Result<(), ProcessError> {
    if timeout(limit, server).await.is_err() {
        tracing::error!("server still busy after {} seconds", limit.as_secs());
        return Err(ProcessError::ShutdownTimeout(limit));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to set up service state: {0}")]
    State(#[from] StateSetupError),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
    #[error("failed to shut down within {0:?}")]
    ShutdownTimeout(Duration),
}
