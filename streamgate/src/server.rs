//! Server lifecycle management
//!
//! Serves the HTTP API until SIGINT/SIGTERM, then drains in-flight requests
//! for at most `server.shutdown_timeout_seconds` before closing the pool.

use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use streamgate_api::{create_router, AppState};
use streamgate_core::{bootstrap::Services, Config};

pub struct StreamGateServer {
    config: Config,
    services: Services,
    pool: PgPool,
}

impl StreamGateServer {
    #[must_use]
    pub const fn new(config: Config, services: Services, pool: PgPool) -> Self {
        Self {
            config,
            services,
            pool,
        }
    }

    /// Serve until a shutdown signal arrives
    pub async fn start(self) -> anyhow::Result<()> {
        let http_addr: std::net::SocketAddr = self
            .config
            .http_address()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{}': {e}", self.config.http_address()))?;

        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;

        let state = AppState::new(self.services, self.pool.clone(), &self.config.admin);
        let router = create_router(state);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let graceful = async move {
            let _ = shutdown_rx.changed().await;
        };

        info!("HTTP server listening on {}", http_addr);
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
        });

        tokio::select! {
            result = &mut server => {
                match result {
                    Ok(Ok(())) => warn!("HTTP server stopped unexpectedly"),
                    Ok(Err(e)) => error!("HTTP server error: {}", e),
                    Err(e) => error!("HTTP server task failed: {}", e),
                }
                self.pool.close().await;
                return Err(anyhow::anyhow!("HTTP server stopped"));
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);

        let drain_timeout = Duration::from_secs(self.config.server.shutdown_timeout_seconds);
        match tokio::time::timeout(drain_timeout, &mut server).await {
            Ok(Ok(Ok(()))) => info!("HTTP server shut down gracefully"),
            Ok(Ok(Err(e))) => error!("HTTP server error during shutdown: {}", e),
            Ok(Err(e)) => error!("HTTP server task failed: {}", e),
            Err(_) => {
                warn!(
                    "Drain timeout of {}s reached with requests still in flight, aborting",
                    drain_timeout.as_secs()
                );
                server.abort();
            }
        }

        info!("Closing database connection pool...");
        self.pool.close().await;
        info!("StreamGate shut down complete");

        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal");
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
