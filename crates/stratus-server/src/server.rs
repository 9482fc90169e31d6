//! HTTP accept loop
//!
//! One hyper http1 connection per task; the shared cancellation token stops
//! the accept loop and cancels in-flight streams on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::router;
use crate::state::AppState;

/// Binds `addr` and serves until `shutdown` fires.
pub async fn run(
    state: Arc<AppState>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "stratus server listening");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer) = result?;
                let io = TokioIo::new(stream);
                let state = Arc::clone(&state);
                let shutdown = shutdown.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        let shutdown = shutdown.clone();
                        async move {
                            Ok::<_, std::convert::Infallible>(
                                router::handle(state, shutdown, req).await,
                            )
                        }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        error!(%peer, error = %e, "connection error");
                    }
                });
            }
            _ = shutdown.cancelled() => {
                info!("server shutting down");
                break;
            }
        }
    }

    Ok(())
}
