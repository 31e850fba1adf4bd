use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{FutureExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use validator::Validate;

use super::classifier::Classifier;
use super::dedup::Deduplicator;
use super::error::{CoordinatorError, SearchError, SourceError, SourceFailure};
use super::filters;
use super::job::{JobSource, RawPosting, SourcePriority};
use super::progress::{ProgressTracker, ScrapingProgress};
use super::search::{SearchFilters, SearchId, SearchPhase, SearchResult, SearchStatus};
use super::source::{AdapterRegistry, FetchRequest, SourceAdapter};
use super::stats::{self, JobStats};
use crate::worker::search_worker::SearchWorker;

/// Tunables for the orchestration engine
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Searches running their fan-out at the same time
    pub max_concurrent_searches: usize,
    /// Accepted searches waiting for a free slot
    pub queue_capacity: usize,
    pub source_timeout: Duration,
    pub search_timeout: Duration,
    pub min_pages: u32,
    pub max_pages: u32,
    /// How long finished searches stay retrievable
    pub retention: Duration,
    /// Upper bound for progress long-polling
    pub max_progress_wait: Duration,
    pub source_priority: SourcePriority,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 4,
            queue_capacity: 32,
            source_timeout: Duration::from_secs(45),
            search_timeout: Duration::from_secs(180),
            min_pages: 1,
            max_pages: 10,
            retention: Duration::from_secs(3600),
            max_progress_wait: Duration::from_secs(30),
            source_priority: SourcePriority::default(),
        }
    }
}

enum SearchOutcome {
    Done(Arc<SearchResult>),
    Aborted(CoordinatorError),
}

struct SearchEntry {
    filters: SearchFilters,
    phase: SearchPhase,
    cancel: CancellationToken,
    cancel_reason: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    outcome: Option<SearchOutcome>,
}

/// What one source task hands back to the search run
type SourceOutcome = (JobSource, Result<Vec<RawPosting>, SourceError>);

/// Owns every search from acceptance to eviction.
///
/// Accepted searches are queued for the [`SearchWorker`], which runs at most
/// `max_concurrent_searches` of them at once. Each run fans out one task per
/// source and assembles the final job set on its own task.
pub struct SearchCoordinator {
    settings: SearchSettings,
    adapters: AdapterRegistry,
    classifier: Arc<Classifier>,
    tracker: ProgressTracker,
    searches: RwLock<HashMap<SearchId, SearchEntry>>,
    queue: mpsc::Sender<SearchId>,
    permits: Arc<Semaphore>,
    root_cancel: CancellationToken,
    shutdown_tx: watch::Sender<bool>,
}

impl SearchCoordinator {
    /// Builds the coordinator and the worker that drains its queue. The
    /// worker must be run for searches to make progress.
    pub fn new(
        settings: SearchSettings,
        adapters: AdapterRegistry,
        classifier: Classifier,
    ) -> (Arc<Self>, SearchWorker) {
        let (queue, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_searches.max(1)));

        let coordinator = Arc::new(Self {
            settings,
            adapters,
            classifier: Arc::new(classifier),
            tracker: ProgressTracker::new(),
            searches: RwLock::new(HashMap::new()),
            queue,
            permits,
            root_cancel: CancellationToken::new(),
            shutdown_tx,
        });
        let worker = SearchWorker::new(coordinator.clone(), rx);
        (coordinator, worker)
    }

    /// Builds the coordinator and spawns its worker on the current runtime.
    pub fn spawn(
        settings: SearchSettings,
        adapters: AdapterRegistry,
        classifier: Classifier,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (coordinator, worker) = Self::new(settings, adapters, classifier);
        let shutdown_rx = coordinator.shutdown_signal();
        let handle = tokio::spawn(worker.run(shutdown_rx));
        (coordinator, handle)
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub(crate) fn permits(&self) -> Arc<Semaphore> {
        self.permits.clone()
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_accepting(&self) -> bool {
        !self.root_cancel.is_cancelled()
    }

    /// Searches currently holding a concurrency slot
    pub fn in_flight(&self) -> usize {
        self.settings.max_concurrent_searches.max(1) - self.permits.available_permits()
    }

    /// Validates and registers a search, then queues it for dispatch.
    pub fn start_search(&self, filters: SearchFilters) -> Result<SearchId, SearchError> {
        if !self.is_accepting() {
            return Err(SearchError::ShuttingDown);
        }
        filters
            .validate()
            .map_err(|e| SearchError::Validation(e.to_string()))?;
        let filters = filters.normalize(self.settings.min_pages, self.settings.max_pages);

        let id = SearchId::new();
        let started_at = Utc::now();
        let sources = filters.sources.clone();
        {
            let mut searches = self.searches.write();
            searches.insert(
                id,
                SearchEntry {
                    filters,
                    phase: SearchPhase::Created,
                    cancel: self.root_cancel.child_token(),
                    cancel_reason: None,
                    started_at,
                    completed_at: None,
                    outcome: None,
                },
            );
        }
        self.tracker.register(id, &sources, started_at);

        if let Err(e) = self.queue.try_send(id) {
            self.searches.write().remove(&id);
            self.tracker.remove(id);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Search queue is full, rejecting search");
                    SearchError::Busy
                }
                mpsc::error::TrySendError::Closed(_) => SearchError::ShuttingDown,
            });
        }

        info!("Search {} accepted for sources {:?}", id, sources);
        Ok(id)
    }

    /// Signals cancellation. Returns false when the search already finished
    /// or is past the point where cancelling changes its outcome. A search
    /// that is still queued is aborted right away.
    pub fn cancel(&self, id: SearchId) -> Result<bool, SearchError> {
        let queued = {
            let mut searches = self.searches.write();
            let entry = searches.get_mut(&id).ok_or(SearchError::NotFound(id))?;
            if entry.outcome.is_some() || entry.phase == SearchPhase::Finalizing {
                return Ok(false);
            }
            if entry.cancel_reason.is_none() {
                entry.cancel_reason = Some("cancelled by client".to_string());
            }
            entry.cancel.cancel();
            entry.phase == SearchPhase::Created
        };

        info!("Search {} cancellation requested", id);
        if queued {
            // The worker skips it once it reaches the head of the queue
            self.abort_cancelled(id);
        }
        Ok(true)
    }

    pub fn progress(&self, id: SearchId) -> Result<ScrapingProgress, SearchError> {
        self.tracker.snapshot(id).ok_or(SearchError::NotFound(id))
    }

    /// Returns as soon as the progress changes, the search is terminal or
    /// `wait` (capped by settings) elapses.
    pub async fn wait_for_progress(
        &self,
        id: SearchId,
        wait: Duration,
    ) -> Result<ScrapingProgress, SearchError> {
        let mut rx = self.tracker.subscribe(id).ok_or(SearchError::NotFound(id))?;
        let terminal = rx.borrow_and_update().status.is_terminal();
        if !terminal {
            let wait = wait.min(self.settings.max_progress_wait);
            // Err means timed out or the search was evicted; return what we have
            let _ = tokio::time::timeout(wait, rx.changed()).await;
        }
        let snapshot = rx.borrow().clone();
        Ok(snapshot)
    }

    pub fn result(&self, id: SearchId) -> Result<Arc<SearchResult>, SearchError> {
        let searches = self.searches.read();
        let entry = searches.get(&id).ok_or(SearchError::NotFound(id))?;
        match &entry.outcome {
            Some(SearchOutcome::Done(result)) => Ok(result.clone()),
            Some(SearchOutcome::Aborted(e)) => Err(SearchError::NotReady {
                id,
                status: SearchStatus::Failed,
                reason: Some(e.to_string()),
            }),
            None => Err(SearchError::NotReady {
                id,
                status: entry.phase.status(),
                reason: None,
            }),
        }
    }

    pub fn stats(&self, id: SearchId) -> Result<JobStats, SearchError> {
        self.result(id).map(|result| result.stats.clone())
    }

    /// Drops finished searches older than the retention window.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(self.settings.retention)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let expired: Vec<SearchId> = self
            .searches
            .read()
            .iter()
            .filter(|(_, entry)| entry.completed_at.is_some_and(|at| at + retention <= now))
            .map(|(id, _)| *id)
            .collect();

        let mut searches = self.searches.write();
        for id in &expired {
            searches.remove(id);
            self.tracker.remove(*id);
        }
        expired.len()
    }

    /// Stops accepting searches, cancels everything in flight and tells the
    /// worker to stop.
    pub fn shutdown(&self) {
        info!("Search coordinator shutting down");
        self.root_cancel.cancel();
        // Receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits until every running search released its slot.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let all = self.settings.max_concurrent_searches.max(1) as u32;
        matches!(
            tokio::time::timeout(timeout, self.permits.acquire_many(all)).await,
            Ok(Ok(_))
        )
    }

    pub(crate) fn cancel_token(&self, id: SearchId) -> Option<CancellationToken> {
        self.searches.read().get(&id).map(|e| e.cancel.clone())
    }

    fn set_phase(&self, id: SearchId, phase: SearchPhase) {
        if let Some(entry) = self.searches.write().get_mut(&id) {
            debug!("Search {} phase {:?} -> {:?}", id, entry.phase, phase);
            entry.phase = phase;
        }
    }

    fn cancel_reason(&self, id: SearchId) -> String {
        self.searches
            .read()
            .get(&id)
            .and_then(|e| e.cancel_reason.clone())
            .unwrap_or_else(|| "service shutting down".to_string())
    }

    /// Records the terminal outcome exactly once, then publishes it.
    fn finish(&self, id: SearchId, outcome: SearchOutcome) {
        let now = Utc::now();
        {
            let mut searches = self.searches.write();
            let Some(entry) = searches.get_mut(&id) else {
                return;
            };
            if entry.outcome.is_some() {
                return;
            }
            entry.phase = match outcome {
                SearchOutcome::Done(_) => SearchPhase::Done,
                SearchOutcome::Aborted(_) => SearchPhase::Aborted,
            };
            entry.completed_at = Some(now);
            entry.outcome = Some(outcome);
            // Adapter work still watching the token unwinds
            entry.cancel.cancel();
        }

        let searches = self.searches.read();
        match searches.get(&id).and_then(|e| e.outcome.as_ref()) {
            Some(SearchOutcome::Done(result)) => {
                self.tracker.complete(id, result.total_count, now);
                info!(
                    "Search {} done: {} jobs from {:?} in {:.1}s",
                    id, result.total_count, result.sources_scraped, result.scraping_duration
                );
            }
            Some(SearchOutcome::Aborted(e)) => {
                self.tracker.fail(id, e.to_string(), now);
                warn!("Search {} aborted: {}", id, e);
            }
            None => {}
        }
    }

    pub(crate) fn abort(&self, id: SearchId, error: CoordinatorError) {
        self.finish(id, SearchOutcome::Aborted(error));
    }

    pub(crate) fn abort_cancelled(&self, id: SearchId) {
        let reason = self.cancel_reason(id);
        self.abort(id, CoordinatorError::Cancelled(reason));
    }

    /// Runs one search to a terminal state. Called by the worker while it
    /// holds a concurrency slot.
    pub(crate) async fn run_search(self: Arc<Self>, id: SearchId) {
        let Some((filters, cancel, started_at)) = self
            .searches
            .read()
            .get(&id)
            .map(|e| (e.filters.clone(), e.cancel.clone(), e.started_at))
        else {
            return;
        };
        if cancel.is_cancelled() {
            self.abort_cancelled(id);
            return;
        }

        self.set_phase(id, SearchPhase::Dispatching);
        self.tracker
            .start(id, format!("Fetching from {} sources", filters.sources.len()));

        let deadline = Instant::now() + self.settings.search_timeout;
        let mut failures: Vec<SourceFailure> = Vec::new();
        let mut tasks: JoinSet<SourceOutcome> = JoinSet::new();
        let mut pending: Vec<JobSource> = Vec::new();

        for source in &filters.sources {
            let Some(adapter) = self.adapters.get(*source) else {
                let error = SourceError::Unavailable("no adapter registered".to_string());
                warn!("Search {}: {} has no adapter", id, source);
                let failure = SourceFailure::new(*source, &error);
                self.tracker.record_failure(id, failure.clone());
                failures.push(failure);
                continue;
            };
            let source_deadline = deadline.min(Instant::now() + self.settings.source_timeout);
            let request = FetchRequest::from_filters(&filters, source_deadline, cancel.child_token());
            pending.push(*source);
            tasks.spawn(fetch_source(*source, adapter, request));
        }

        if pending.is_empty() {
            self.abort(id, CoordinatorError::NoValidSources);
            return;
        }

        self.set_phase(id, SearchPhase::AwaitingCompletions);
        let mut staging = Deduplicator::new();
        let mut succeeded: Vec<JobSource> = Vec::new();
        let overall = tokio::time::sleep_until(deadline);
        tokio::pin!(overall);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    self.abort_cancelled(id);
                    return;
                }
                _ = &mut overall => {
                    cancel.cancel();
                    tasks.abort_all();
                    for source in pending.drain(..) {
                        let error = SourceError::Timeout(self.settings.search_timeout);
                        warn!("Search {}: {} still running at the search deadline", id, source);
                        let failure = SourceFailure::new(source, &error);
                        self.tracker.record_failure(id, failure.clone());
                        failures.push(failure);
                    }
                    break;
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((source, outcome))) => {
                        pending.retain(|s| *s != source);
                        match outcome {
                            Ok(postings) => {
                                let fetched = postings.len();
                                let now = Utc::now();
                                let jobs = postings
                                    .iter()
                                    .map(|p| self.classifier.classify(source, p, started_at, now))
                                    .collect();
                                let new_keys = staging.stage(source, jobs);
                                info!(
                                    "Search {}: {} returned {} postings ({} new)",
                                    id, source, fetched, new_keys
                                );
                                self.tracker.record_success(id, source, staging.unique_count());
                                succeeded.push(source);
                            }
                            Err(e) => {
                                warn!("Search {}: {} failed: {}", id, source, e);
                                let failure = SourceFailure::new(source, &e);
                                self.tracker.record_failure(id, failure.clone());
                                failures.push(failure);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("Search {}: source task ended abnormally: {}", id, e);
                    }
                },
            }
        }

        // Tasks that vanished without reporting
        for source in pending.drain(..) {
            let error = SourceError::Unavailable("source task ended without a result".to_string());
            let failure = SourceFailure::new(source, &error);
            self.tracker.record_failure(id, failure.clone());
            failures.push(failure);
        }

        self.set_phase(id, SearchPhase::Finalizing);
        self.tracker
            .set_message(id, "Deduplicating and filtering results");

        if succeeded.is_empty() {
            self.abort(id, CoordinatorError::AllSourcesFailed(failures.len()));
            return;
        }

        let priority = &self.settings.source_priority;
        let merged = staging.finalize(priority);
        let mut jobs = match filters::apply(&filters, merged, started_at) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Search {}: invalid keyword pattern: {}", id, e);
                self.abort(id, CoordinatorError::Internal(e.to_string()));
                return;
            }
        };
        filters::order(&mut jobs, priority);

        failures.sort_by_key(|f| priority.rank(f.source));
        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let result = SearchResult {
            search_id: id,
            total_count: jobs.len(),
            stats: stats::compute(&jobs, completed_at),
            jobs,
            filters_applied: filters,
            sources_scraped: priority.sorted(succeeded),
            sources_failed: failures,
            created_at: started_at,
            completed_at,
            scraping_duration: duration,
        };
        self.finish(id, SearchOutcome::Done(Arc::new(result)));
    }
}

/// Fetches everything one source has for the request, bounded by the
/// request deadline and cancellation. Adapter panics become source errors.
async fn fetch_source(
    source: JobSource,
    adapter: Arc<dyn SourceAdapter>,
    request: FetchRequest,
) -> SourceOutcome {
    let cancel = request.cancel.clone();
    let deadline = request.deadline;
    let budget = deadline.saturating_duration_since(Instant::now());

    let work = AssertUnwindSafe(async {
        let mut stream = adapter.fetch(&request).await?;
        let mut postings = Vec::new();
        while let Some(item) = stream.next().await {
            postings.push(item?);
        }
        Ok(postings)
    })
    .catch_unwind();

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(SourceError::Unavailable("fetch cancelled".to_string())),
        outcome = tokio::time::timeout_at(deadline, work) => match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SourceError::Unavailable("adapter panicked".to_string())),
            Err(_) => Err(SourceError::Timeout(budget)),
        },
    };

    // Let the adapter's own tasks unwind
    cancel.cancel();
    (source, result)
}
