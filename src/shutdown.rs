use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::coordinator::SearchCoordinator;

/// Handles graceful shutdown of the application
///
/// Orchestrates shutdown by:
/// 1. Listening for shutdown signals (SIGTERM, SIGINT/CTRL+C)
/// 2. Stopping the HTTP server (stops accepting new requests)
/// 3. Cancelling in-flight searches and signalling the workers
/// 4. Waiting for workers and running searches to wind down
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    worker_handles: Vec<JoinHandle<()>>,
    search_coordinator: Arc<SearchCoordinator>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        worker_handles: Vec<JoinHandle<()>>,
        search_coordinator: Arc<SearchCoordinator>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            worker_handles,
            search_coordinator,
            drain_timeout,
        }
    }

    /// Wait for shutdown signal and perform graceful shutdown
    ///
    /// Blocks until either CTRL+C or SIGTERM (Unix only) is received.
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        #[cfg(unix)]
        let terminate = terminate.recv();

        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = ctrl_c => {
                result?;
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    /// Perform the actual shutdown sequence
    async fn shutdown(self) -> Result<(), std::io::Error> {
        // 1. Stop HTTP server (stop accepting new requests)
        info!("Stopping HTTP server (no longer accepting new requests)...");
        self.server_handle.stop(true).await;
        info!("HTTP server stopped accepting new requests");

        // 2. Cancel running searches and signal the workers
        info!("Cancelling in-flight searches and signalling workers...");
        self.search_coordinator.shutdown();

        // 3. Wait for the workers to stop
        let num_workers = self.worker_handles.len();
        info!("Waiting for {} workers to stop...", num_workers);
        let mut completed = 0;
        for (i, handle) in self.worker_handles.into_iter().enumerate() {
            match handle.await {
                Ok(_) => {
                    completed += 1;
                    info!("Worker {} stopped ({}/{})", i + 1, completed, num_workers);
                }
                Err(e) => error!("Worker {} failed to stop: {:?}", i + 1, e),
            }
        }
        info!("All workers stopped");

        // 4. Wait for cancelled searches to release their slots
        if self.search_coordinator.wait_idle(self.drain_timeout).await {
            info!("All searches wound down");
        } else {
            warn!(
                "{} searches still running after {:?}",
                self.search_coordinator.in_flight(),
                self.drain_timeout
            );
        }

        // 5. Wait for HTTP server task to complete
        info!("Waiting for HTTP server to fully shut down...");
        match self.server_task.await {
            Ok(Ok(_)) => info!("HTTP server shut down successfully"),
            Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
            Err(e) => error!("HTTP server task panicked: {:?}", e),
        }

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
