use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long SIGTERM leaves in-flight requests before the server is told to stop
const SIGTERM_GRACE: Duration = Duration::from_secs(10);

/// Spawn the signal listener. The task ends after it has sent on the watch
///  channel; the sender is also handed back so the server can stop the
///  process when it fails.
pub fn graceful_shutdown_blocker(
) -> std::io::Result<(JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>)> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("SIGINT, stopping now");
            }
            _ = sigterm.recv() => {
                tracing::info!(grace_secs = SIGTERM_GRACE.as_secs(), "SIGTERM, stopping after grace period");
                tokio::time::sleep(SIGTERM_GRACE).await;
            }
        }
        let _ = signal_tx.send(());
    });

    Ok((handle, tx, rx))
}

/// Route panics through tracing so they land in the log files too
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => tracing::error!(
            message = %panic,
            panic.file = loc.file(),
            panic.line = loc.line(),
        ),
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let profile = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };
    tracing::info!(profile, version = env!("CARGO_PKG_VERSION"), "strata starting");
}
