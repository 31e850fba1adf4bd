use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::coordinator::SearchCoordinator;

/// Periodically drops finished searches past their retention window
pub struct EvictionWorker {
    coordinator: Arc<SearchCoordinator>,
    interval: Duration,
}

impl EvictionWorker {
    pub fn new(coordinator: Arc<SearchCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Eviction worker started, sweeping every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let evicted = self.coordinator.evict_expired(Utc::now());
                    if evicted > 0 {
                        info!("Evicted {} expired searches", evicted);
                    } else {
                        debug!("No expired searches to evict");
                    }
                }
            }
        }
        info!("Eviction worker stopped");
    }
}
