use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::engine::coordinator::SearchCoordinator;
use crate::engine::error::CoordinatorError;
use crate::engine::search::SearchId;

/// Background worker dispatching queued searches
pub struct SearchWorker {
    coordinator: Arc<SearchCoordinator>,
    queue: mpsc::Receiver<SearchId>,
}

impl SearchWorker {
    pub fn new(coordinator: Arc<SearchCoordinator>, queue: mpsc::Receiver<SearchId>) -> Self {
        Self { coordinator, queue }
    }

    /// Run worker with semaphore-based bounded concurrency
    ///
    /// # Architecture
    /// - Receives accepted searches from the coordinator queue in FIFO order
    /// - Acquires a semaphore permit before spawning the search run
    /// - A search cancelled while waiting for a permit is aborted right away
    /// - Permit is released when the search reaches a terminal state
    ///
    /// On shutdown the worker stops taking searches and aborts whatever is
    /// still queued so every accepted search ends in a terminal state.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Search worker started with semaphore-based concurrency");
        let semaphore = self.coordinator.permits();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let id = tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
                next = self.queue.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            let Some(cancel) = self.coordinator.cancel_token(id) else {
                // Evicted before dispatch
                continue;
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    self.coordinator.abort_cancelled(id);
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => permit,
            };

            match permit {
                Ok(permit) => {
                    info!("Dispatching search {}", id);
                    let coordinator = self.coordinator.clone();
                    tokio::spawn(async move {
                        coordinator.run_search(id).await;
                        // Permit is dropped here, releasing the semaphore
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!("Failed to acquire semaphore for search {}: {:?}", id, e);
                    self.coordinator
                        .abort(id, CoordinatorError::Internal("dispatcher unavailable".to_string()));
                }
            }
        }

        self.queue.close();
        let mut drained = 0;
        while let Ok(id) = self.queue.try_recv() {
            self.coordinator.abort_cancelled(id);
            drained += 1;
        }
        info!("Search worker stopped, {} queued searches aborted", drained);
    }
}
