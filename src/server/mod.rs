//! HTTP binding for the login backend.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

pub use handlers::{AppState, create_router};

use crate::auth_backend::AuthBackend;
use crate::config::Config;
use crate::{Error, Result};

/// HTTP server
pub struct Server {
    config: Config,
    backend: Arc<AuthBackend>,
}

impl Server {
    /// Create a server for `backend`.
    #[must_use]
    pub fn new(config: Config, backend: Arc<AuthBackend>) -> Self {
        Self { config, backend }
    }

    /// Bind and serve until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address: {e}")))?;

        let admin_token = self.config.admin.resolve_bearer_token();
        if admin_token.is_none() {
            warn!("No admin bearer token configured; /v1/map and /v1/certs are disabled");
        }

        let state = Arc::new(AppState {
            backend: Arc::clone(&self.backend),
            admin_token,
        });
        let app = create_router(state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;

        info!("INSTANCE CERT AUTH v{}", env!("CARGO_PKG_VERSION"));
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
