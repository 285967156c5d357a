//! Shutdown signals.
//!
//! Container runtimes stop a startup step with SIGTERM, terminals with
//! Ctrl-C. Both cancel the run so in-flight batches finish and the summary
//! is still printed.

use modelorg_core::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cancel `cancel` on the first Ctrl-C or SIGTERM.
///
/// Handlers are registered before this returns, so a signal arriving right
/// after the call is not lost.
pub fn spawn_shutdown_listener(cancel: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            terminate.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Interrupt received, finishing in-flight batches"),
            _ = terminate => info!("SIGTERM received, finishing in-flight batches"),
        }
        cancel.cancel();
    }))
}
