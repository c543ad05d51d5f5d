//! HTTP listener

use crate::error::AppError;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serve `router` on `bind` until Ctrl+C or until `ct` is cancelled
///
/// In-flight requests are drained before returning.
pub async fn run_http(router: Router, bind: SocketAddr, ct: CancellationToken) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::Http(format!("failed to bind {bind}: {e}")))?;

    let local = listener
        .local_addr()
        .map_err(|e| AppError::Http(e.to_string()))?;
    info!("cloudware listening on http://{}", local);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(ct))
        .await
        .map_err(|e| AppError::Http(e.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal(ct: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = ct.cancelled() => {
            info!("Server cancelled");
        }
    }
}
