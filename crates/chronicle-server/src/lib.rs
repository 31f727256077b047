//! Chronicle audit pipeline HTTP gateway.
//!
//! The server wires the full pipeline together: the ingestion gateway
//! (webhook deliveries and the internal logger), the query and trace API,
//! the health surface, and the retention lifecycle task. Shutdown is
//! graceful: the HTTP listener drains, then the audit logger performs its
//! final drain-and-flush, then the retention task stops.

pub mod config;
pub mod error;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod webhook;

pub use config::{ServerConfig, WebhookSourceConfig};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;
use shutdown::shutdown_signal;
use state::BackgroundTasks;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Server builder for constructing and running the gateway.
pub struct Server {
    config: ServerConfig,
    state: AppState,
    tasks: BackgroundTasks,
}

impl Server {
    /// Create a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> Result<Self, anyhow::Error> {
        let (state, tasks) = AppState::build(&config).await?;
        Ok(Self {
            config,
            state,
            tasks,
        })
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// The server's socket address.
    pub fn addr(&self) -> Result<SocketAddr, anyhow::Error> {
        self.config.socket_addr()
    }

    /// Run the server until a shutdown signal, then drain the pipeline.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Chronicle gateway listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // The listener has drained; no new events can arrive. Flush the
        // buffer before stopping the background tasks.
        if let Err(e) = self.state.logger.shutdown().await {
            warn!(error = %e, "Audit logger drain failed during shutdown");
        }
        self.state.shutdown.initiate();
        let _ = self.tasks.ingest.await;
        let _ = self.tasks.retention.await;

        info!("Chronicle gateway stopped");
        Ok(())
    }
}
