//! # Graceful Shutdown Module
//!
//! Turns process signals into a [`CancellationToken`] that the server and
//! background tasks share.
//!
//! ## Shutdown Process:
//!
//! 1. **Signal Reception**: SIGINT, SIGTERM or SIGQUIT cancels the token
//! 2. **Stop Accepting**: `axum::serve` stops taking new connections
//! 3. **Drain Connections**: in-flight requests, streams included, run to completion
//! 4. **Stop Background Work**: the model refresh loop exits on the same token

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Wait for a shutdown signal.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use signal::unix::{signal as unix_signal, SignalKind};

        let (mut sigterm, mut sigquit) = match (
            unix_signal(SignalKind::terminate()),
            unix_signal(SignalKind::quit()),
        ) {
            (Ok(term), Ok(quit)) => (term, quit),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                ctrl_c.await;
                info!("Received SIGINT (Ctrl+C)");
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigquit.recv() => info!("Received SIGQUIT"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received SIGINT (Ctrl+C)");
    }
}

/// Cancel `token` on the first shutdown signal. Returns once either the
/// signal arrived or someone else cancelled the token.
pub async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            info!("Graceful shutdown initiated");
            token.cancel();
        }
        _ = token.cancelled() => {
            info!("Shutdown requested");
        }
    }
}
