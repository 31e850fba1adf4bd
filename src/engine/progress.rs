use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use super::error::SourceFailure;
use super::job::JobSource;
use super::search::{SearchId, SearchStatus};

/// Point-in-time view of one search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapingProgress {
    pub id: SearchId,
    pub status: SearchStatus,
    /// 0-100, never decreases
    pub progress: u8,
    pub current_source: Option<JobSource>,
    pub message: String,
    /// Distinct postings staged so far, never decreases
    pub jobs_found: usize,
    pub sources_completed: Vec<JobSource>,
    pub sources_failed: Vec<SourceFailure>,
    pub sources_pending: Vec<JobSource>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ScrapingProgress {
    fn new(id: SearchId, sources: &[JobSource], started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SearchStatus::Pending,
            progress: 0,
            current_source: None,
            message: "Search queued".to_string(),
            jobs_found: 0,
            sources_completed: Vec::new(),
            sources_failed: Vec::new(),
            sources_pending: sources.to_vec(),
            started_at,
            completed_at: None,
            error: None,
        }
    }

    fn total_sources(&self) -> usize {
        self.sources_completed.len() + self.sources_failed.len() + self.sources_pending.len()
    }

    fn mark_reported(&mut self, source: JobSource) {
        self.sources_pending.retain(|s| *s != source);
        self.current_source = self.sources_pending.first().copied();

        let total = self.total_sources();
        if total > 0 {
            let reported = total - self.sources_pending.len();
            let computed = (reported * 100 / total) as u8;
            self.progress = self.progress.max(computed);
        }
    }
}

/// Per-search progress state machine: `pending -> running -> completed | failed`.
///
/// Every search has one watch channel; all writes go through
/// `send_if_modified` under the registry lock, so readers always see a whole
/// snapshot and updates after a terminal state are dropped.
#[derive(Default)]
pub struct ProgressTracker {
    searches: Mutex<HashMap<SearchId, watch::Sender<ScrapingProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: SearchId, sources: &[JobSource], started_at: DateTime<Utc>) {
        let (tx, _rx) = watch::channel(ScrapingProgress::new(id, sources, started_at));
        self.searches.lock().insert(id, tx);
    }

    /// Applies `f` unless the search is unknown or already terminal.
    fn update(&self, id: SearchId, f: impl FnOnce(&mut ScrapingProgress)) -> bool {
        let searches = self.searches.lock();
        let Some(tx) = searches.get(&id) else {
            return false;
        };
        tx.send_if_modified(|progress| {
            if progress.status.is_terminal() {
                return false;
            }
            f(progress);
            true
        })
    }

    pub fn start(&self, id: SearchId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update(id, |p| {
            p.status = SearchStatus::Running;
            p.current_source = p.sources_pending.first().copied();
            p.message = message;
        })
    }

    pub fn set_message(&self, id: SearchId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update(id, |p| p.message = message)
    }

    pub fn record_success(&self, id: SearchId, source: JobSource, jobs_found: usize) -> bool {
        self.update(id, |p| {
            if !p.sources_completed.contains(&source) {
                p.sources_completed.push(source);
            }
            p.mark_reported(source);
            p.jobs_found = p.jobs_found.max(jobs_found);
            p.message = format!("Finished {}", source);
        })
    }

    pub fn record_failure(&self, id: SearchId, failure: SourceFailure) -> bool {
        self.update(id, |p| {
            let source = failure.source;
            p.message = format!("{} failed: {}", source, failure.message);
            if !p.sources_failed.iter().any(|f| f.source == source) {
                p.sources_failed.push(failure);
            }
            p.mark_reported(source);
        })
    }

    /// Terminal success; returns false when the search was already terminal.
    /// `jobs_kept` is the size of the filtered result, `jobs_found` keeps
    /// counting everything staged.
    pub fn complete(&self, id: SearchId, jobs_kept: usize, at: DateTime<Utc>) -> bool {
        self.update(id, |p| {
            p.status = SearchStatus::Completed;
            p.progress = 100;
            p.current_source = None;
            p.jobs_found = p.jobs_found.max(jobs_kept);
            p.message = format!("Completed, {} jobs after filtering", jobs_kept);
            p.completed_at = Some(at);
        })
    }

    /// Terminal failure; returns false when the search was already terminal.
    pub fn fail(&self, id: SearchId, error: impl Into<String>, at: DateTime<Utc>) -> bool {
        let error = error.into();
        self.update(id, |p| {
            p.status = SearchStatus::Failed;
            p.current_source = None;
            p.message = format!("Failed: {}", error);
            p.error = Some(error);
            p.completed_at = Some(at);
        })
    }

    pub fn snapshot(&self, id: SearchId) -> Option<ScrapingProgress> {
        self.searches.lock().get(&id).map(|tx| tx.borrow().clone())
    }

    /// Receiver that is notified on every accepted update
    pub fn subscribe(&self, id: SearchId) -> Option<watch::Receiver<ScrapingProgress>> {
        self.searches.lock().get(&id).map(|tx| tx.subscribe())
    }

    pub fn remove(&self, id: SearchId) -> bool {
        self.searches.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.searches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::SourceError;

    fn tracker_with(sources: &[JobSource]) -> (ProgressTracker, SearchId) {
        let tracker = ProgressTracker::new();
        let id = SearchId::new();
        tracker.register(id, sources, Utc::now());
        (tracker, id)
    }

    #[test]
    fn progress_counts_failed_and_succeeded_sources() {
        let (tracker, id) =
            tracker_with(&[JobSource::Indeed, JobSource::Dice, JobSource::Linkedin]);
        assert_eq!(tracker.snapshot(id).unwrap().status, SearchStatus::Pending);

        tracker.start(id, "go");
        assert_eq!(tracker.snapshot(id).unwrap().current_source, Some(JobSource::Indeed));

        tracker.record_success(id, JobSource::Indeed, 4);
        let p = tracker.snapshot(id).unwrap();
        assert_eq!(p.progress, 33);
        assert_eq!(p.current_source, Some(JobSource::Dice));

        tracker.record_failure(
            id,
            SourceFailure::new(JobSource::Dice, &SourceError::Unavailable("down".into())),
        );
        let p = tracker.snapshot(id).unwrap();
        assert_eq!(p.progress, 66);
        assert_eq!(p.sources_completed, vec![JobSource::Indeed]);
        assert_eq!(p.sources_failed.len(), 1);
        assert_eq!(p.jobs_found, 4);
    }

    #[test]
    fn jobs_found_never_decreases() {
        let (tracker, id) = tracker_with(&[JobSource::Indeed, JobSource::Dice]);
        tracker.start(id, "go");
        tracker.record_success(id, JobSource::Indeed, 7);
        tracker.record_success(id, JobSource::Dice, 3);
        assert_eq!(tracker.snapshot(id).unwrap().jobs_found, 7);
    }

    #[test]
    fn terminal_state_is_entered_once() {
        let (tracker, id) = tracker_with(&[JobSource::Indeed]);
        tracker.start(id, "go");
        assert!(tracker.complete(id, 2, Utc::now()));
        assert!(!tracker.fail(id, "late failure", Utc::now()));
        assert!(!tracker.record_success(id, JobSource::Indeed, 10));

        let p = tracker.snapshot(id).unwrap();
        assert_eq!(p.status, SearchStatus::Completed);
        assert_eq!(p.progress, 100);
        assert_eq!(p.jobs_found, 2);
        assert!(p.error.is_none());
    }

    #[test]
    fn unknown_search_has_no_snapshot() {
        let tracker = ProgressTracker::new();
        let id = SearchId::new();
        assert!(tracker.snapshot(id).is_none());
        assert!(!tracker.start(id, "go"));
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let (tracker, id) = tracker_with(&[JobSource::Indeed]);
        let mut rx = tracker.subscribe(id).unwrap();
        tracker.start(id, "go");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, SearchStatus::Running);
    }
}
