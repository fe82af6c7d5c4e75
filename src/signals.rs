use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Resolves on SIGTERM or SIGINT
///
/// Used as the graceful shutdown trigger for the HTTP server. If a handler
/// cannot be installed the remaining one still applies.
#[cfg(unix)]
pub async fn shutdown_signal() {
    let sigterm = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = sigterm => info!("SIGTERM received, initiating graceful shutdown"),
        _ = ctrl_c() => info!("SIGINT received, initiating graceful shutdown"),
    }
}

/// Only Ctrl+C is available off unix
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await;
    info!("Ctrl+C received, initiating shutdown");
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
