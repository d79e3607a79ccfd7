//! Server lifecycle: bind, serve until cancelled, shut down gracefully.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use blockrun_engine::RunOrchestrator;

use crate::identity::IdentityResolver;
use crate::routes::{AppState, router};

/// How long `stop` waits for in-flight requests before aborting the server task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Host configuration for the blockrun HTTP server.
#[derive(Clone)]
pub struct HttpServer {
    bind_address: SocketAddr,
    state: AppState,
}

impl HttpServer {
    pub fn new(bind_address: SocketAddr, orchestrator: Arc<RunOrchestrator>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            bind_address,
            state: AppState::new(orchestrator, identity),
        }
    }

    /// Start the server and return a handle for inspection and shutdown.
    pub async fn start(self) -> Result<RunningHttpServer> {
        let cancellation_token = CancellationToken::new();

        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;
        let bound_address = listener.local_addr()?;
        let app = router(self.state.with_shutdown(cancellation_token.child_token()));

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await;
            }
        });

        info!(target: "blockrun::server", address = %bound_address, "listening");
        Ok(RunningHttpServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
        })
    }
}

/// Runtime handle for a running server.
#[derive(Debug)]
pub struct RunningHttpServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
}

impl RunningHttpServer {
    /// Return the bound socket address for the running server.
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop accepting connections, close open relays and wait for in-flight
    /// requests to finish. The server task is aborted after a grace period.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();

        let mut server_handle = self.server_handle;
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server_handle).await {
            Ok(joined) => joined.map_err(|error| anyhow!("HTTP server task failed: {error}"))?,
            Err(_) => {
                warn!(target: "blockrun::server", address = %self.bind_address, "graceful shutdown timed out; aborting");
                server_handle.abort();
            }
        }
        info!(target: "blockrun::server", address = %self.bind_address, "stopped");
        Ok(())
    }
}
