//! # Stop-signal hook for the drain sequence.
//!
//! [`wait_for_shutdown_signal`] completes when the process is asked to stop.
//! Callers follow it with [`JobGate::shutdown`](crate::JobGate::shutdown) so
//! queued requests resolve and running jobs get their grace period before the
//! process exits.

/// Completes on `SIGINT` (Ctrl-C) or `SIGTERM` (service managers).
///
/// Listeners are registered per call; `Err` means the runtime could not
/// install a handler.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
