use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::SourceError;
use super::job::{JobCategory, JobSource, RawPosting, TimeFilter};
use super::search::{Credential, SearchFilters};

/// Lazy, finite sequence of postings from one source
pub type PostingStream = Pin<Box<dyn Stream<Item = Result<RawPosting, SourceError>> + Send>>;

/// Parameters handed to an adapter for one search
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub category: JobCategory,
    pub keywords: Option<String>,
    pub location: String,
    pub time_filter: TimeFilter,
    pub max_pages: u32,
    /// The coordinator stops waiting at this instant regardless
    pub deadline: Instant,
    /// Cancelled when the search is cancelled or the deadline passes
    pub cancel: CancellationToken,
    pub credential: Option<Credential>,
}

impl FetchRequest {
    pub fn from_filters(filters: &SearchFilters, deadline: Instant, cancel: CancellationToken) -> Self {
        Self {
            category: filters.category,
            keywords: filters.keywords.clone(),
            location: filters.location.clone(),
            time_filter: filters.time_filter,
            max_pages: filters.max_pages_per_source,
            deadline,
            cancel,
            credential: filters.extended_search_key.clone(),
        }
    }
}

/// Capability one job board exposes to the coordinator.
///
/// Implementations should watch `request.cancel` between pages; the
/// coordinator drops the stream on cancellation or timeout either way.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> JobSource;

    async fn fetch(&self, request: &FetchRequest) -> Result<PostingStream, SourceError>;
}

/// At most one adapter per source
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<JobSource, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under its own source, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> &mut Self {
        self.adapters.insert(adapter.source(), adapter);
        self
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, source: JobSource) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&source).cloned()
    }

    pub fn contains(&self, source: JobSource) -> bool {
        self.adapters.contains_key(&source)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
