//! Shutdown signal handling for the long-running server.

use tokio::signal;
use tracing::{info, warn};

/// Resolves on SIGINT or SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!("Failed to register SIGTERM handler ({e}), waiting for Ctrl-C only");
                wait_for_ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C ({e}), serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
