use std::path::PathBuf;

use async_trait::async_trait;
use futures_util::stream;
use tracing::debug;

use crate::engine::error::SourceError;
use crate::engine::job::{JobSource, RawPosting};
use crate::engine::source::{FetchRequest, PostingStream, SourceAdapter};

/// Postings per page of a fixture file
pub const PAGE_SIZE: usize = 25;

/// Serves postings recorded as JSON at `{dir}/{source}.json`.
///
/// The file holds an array of postings. Only the first `max_pages` pages of
/// `PAGE_SIZE` postings are returned, as a board would.
pub struct FixtureAdapter {
    source: JobSource,
    dir: PathBuf,
}

impl FixtureAdapter {
    pub fn new(source: JobSource, dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dir: dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.source))
    }
}

#[async_trait]
impl SourceAdapter for FixtureAdapter {
    fn source(&self) -> JobSource {
        self.source
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<PostingStream, SourceError> {
        if request.cancel.is_cancelled() {
            return Err(SourceError::Unavailable("fetch cancelled".to_string()));
        }

        let path = self.path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let postings: Vec<RawPosting> = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::ParseError(format!("{}: {}", path.display(), e)))?;

        let limit = PAGE_SIZE * request.max_pages as usize;
        debug!(
            "Fixture {} holds {} postings, serving up to {}",
            path.display(),
            postings.len(),
            limit
        );
        let page: Vec<Result<RawPosting, SourceError>> =
            postings.into_iter().take(limit).map(Ok).collect();
        Ok(Box::pin(stream::iter(page)))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::engine::job::JobCategory;
    use crate::engine::search::SearchFilters;

    fn request(max_pages: u32) -> FetchRequest {
        let mut filters = SearchFilters::new(JobCategory::Cybersecurity, vec![JobSource::Dice]);
        filters.max_pages_per_source = max_pages;
        FetchRequest::from_filters(&filters, Instant::now(), CancellationToken::new())
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("job-aggregator-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn serves_postings_limited_by_pages() {
        let dir = scratch_dir("fixture");
        let postings: Vec<RawPosting> = (0..30)
            .map(|i| RawPosting {
                title: format!("Analyst {}", i),
                company: "Acme".into(),
                location: "Remote".into(),
                ..Default::default()
            })
            .collect();
        std::fs::write(dir.join("dice.json"), serde_json::to_vec(&postings).unwrap()).unwrap();

        let adapter = FixtureAdapter::new(JobSource::Dice, &dir);
        let stream = adapter.fetch(&request(1)).await.unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), PAGE_SIZE);
        assert_eq!(items[0].as_ref().unwrap().title, "Analyst 0");
    }

    #[tokio::test]
    async fn missing_or_broken_files_are_source_errors() {
        let dir = scratch_dir("fixture-broken");
        let adapter = FixtureAdapter::new(JobSource::Dice, &dir);
        assert!(matches!(
            adapter.fetch(&request(1)).await,
            Err(SourceError::Unavailable(_))
        ));

        std::fs::write(dir.join("dice.json"), b"{not json").unwrap();
        assert!(matches!(
            adapter.fetch(&request(1)).await,
            Err(SourceError::ParseError(_))
        ));
    }
}
