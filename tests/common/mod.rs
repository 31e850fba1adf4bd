#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream;

use job_aggregator::engine::{
    AdapterRegistry, Classifier, FetchRequest, JobCategory, JobSource, PostingStream, RawPosting,
    ScrapingProgress, SearchCoordinator, SearchError, SearchFilters, SearchId, SearchSettings,
    SourceAdapter, SourceError, TermSets,
};

/// Returns fixed postings after a delay
pub struct StaticAdapter {
    pub source: JobSource,
    pub postings: Vec<RawPosting>,
    pub delay: Duration,
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn source(&self) -> JobSource {
        self.source
    }

    async fn fetch(&self, _request: &FetchRequest) -> Result<PostingStream, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Box::pin(stream::iter(self.postings.clone().into_iter().map(Ok))))
    }
}

/// Fails right away
pub struct FailingAdapter {
    pub source: JobSource,
    pub error: SourceError,
}

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn source(&self) -> JobSource {
        self.source
    }

    async fn fetch(&self, _request: &FetchRequest) -> Result<PostingStream, SourceError> {
        Err(self.error.clone())
    }
}

/// Never returns and ignores cancellation
pub struct HangingAdapter {
    pub source: JobSource,
}

#[async_trait]
impl SourceAdapter for HangingAdapter {
    fn source(&self) -> JobSource {
        self.source
    }

    async fn fetch(&self, _request: &FetchRequest) -> Result<PostingStream, SourceError> {
        std::future::pending::<()>().await;
        Ok(Box::pin(stream::empty()))
    }
}

/// Never returns, but leaves a background task that records when the
/// request token is cancelled
pub struct WatchfulAdapter {
    pub source: JobSource,
    pub cancelled: Arc<AtomicBool>,
}

impl WatchfulAdapter {
    pub fn new(source: JobSource) -> Self {
        Self {
            source,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn saw_cancel(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for WatchfulAdapter {
    fn source(&self) -> JobSource {
        self.source
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<PostingStream, SourceError> {
        let cancel = request.cancel.clone();
        let flag = self.cancelled.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        std::future::pending::<()>().await;
        Ok(Box::pin(stream::empty()))
    }
}

pub struct PanickingAdapter {
    pub source: JobSource,
}

#[async_trait]
impl SourceAdapter for PanickingAdapter {
    fn source(&self) -> JobSource {
        self.source
    }

    async fn fetch(&self, _request: &FetchRequest) -> Result<PostingStream, SourceError> {
        panic!("adapter bug");
    }
}

pub fn posting(title: &str, company: &str, url: &str) -> RawPosting {
    RawPosting {
        title: title.to_string(),
        company: company.to_string(),
        location: "Austin, TX".to_string(),
        description: format!("{} at {}", title, company),
        url: Some(url.to_string()),
        posted_date: Some(Utc::now() - chrono::Duration::hours(2)),
        ..Default::default()
    }
}

/// `count` distinct postings hosted on `host`
pub fn postings(host: &str, count: usize) -> Vec<RawPosting> {
    (0..count)
        .map(|i| {
            posting(
                &format!("Security Engineer {}", i),
                "Acme",
                &format!("https://{}/jobs/{}", host, i),
            )
        })
        .collect()
}

pub fn static_adapter(source: JobSource, postings: Vec<RawPosting>) -> Arc<dyn SourceAdapter> {
    Arc::new(StaticAdapter {
        source,
        postings,
        delay: Duration::from_millis(100),
    })
}

pub fn settings() -> SearchSettings {
    SearchSettings {
        source_timeout: Duration::from_secs(5),
        search_timeout: Duration::from_secs(20),
        ..SearchSettings::default()
    }
}

pub fn coordinator(settings: SearchSettings, registry: AdapterRegistry) -> Arc<SearchCoordinator> {
    let classifier = Classifier::new(&TermSets::default()).unwrap();
    let (coordinator, _worker) = SearchCoordinator::spawn(settings, registry, classifier);
    coordinator
}

pub fn filters(sources: Vec<JobSource>) -> SearchFilters {
    SearchFilters::new(JobCategory::Cybersecurity, sources)
}

/// Follows progress until the search is terminal
pub async fn wait_terminal(
    coordinator: &SearchCoordinator,
    id: SearchId,
) -> Result<ScrapingProgress, SearchError> {
    loop {
        let progress = coordinator
            .wait_for_progress(id, Duration::from_secs(30))
            .await?;
        if progress.status.is_terminal() {
            return Ok(progress);
        }
    }
}
