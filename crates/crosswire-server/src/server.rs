//! TCP accept loop.
//!
//! Serves the axum router over plain TCP with Nagle disabled on every
//! accepted socket; SSE frames must leave the moment they are written.

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Accept connections until the listener fails.
///
/// Each connection runs on its own task; slow clients never block accept.
///
/// # Errors
///
/// Returns an error when accepting fails at the listener level.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        if let Err(nodelay_error) = socket.set_nodelay(true) {
            warn!(peer = %peer, "failed to disable Nagle: {nodelay_error}");
        }
        debug!(peer = %peer, "client connected");

        let service = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            let io = TokioIo::new(socket);
            if let Err(connection_error) = auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(io, service)
                .await
            {
                debug!(peer = %peer, "connection closed: {connection_error}");
            }
        });
    }
}
