//! Translation of OS termination signals into cancellation.
//!
//! On Unix SIGINT, SIGTERM and SIGQUIT are handled, with [`tokio::signal::ctrl_c`] awaited as a
//! fallback. Elsewhere only ctrl-c is awaited.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Spawns a watcher that cancels `cancel_token` on the first termination signal.
///
/// The watcher exits quietly if the token is cancelled some other way first.
pub fn cancel_on_shutdown_signal(cancel_token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_shutdown_signal() => {
                match result {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        cancel_token.cancel();
                    }
                    Err(e) => warn!("Could not install signal handlers: {e}"),
                }
            }
            _ = cancel_token.cancelled() => {}
        }
    })
}
