use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::error::SourceFailure;
use crate::engine::job::{Job, JobSource};
use crate::engine::search::{SearchId, SearchStatus};

/// Response for an accepted search
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchAccepted {
    pub search_id: SearchId,
    pub status: SearchStatus,
    pub message: String,
}

/// Long-poll parameters for the progress endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct ProgressQuery {
    #[validate(range(max = 300, message = "wait_secs must be at most 300"))]
    pub wait_secs: Option<u64>,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    50
}

/// Pagination for the results endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct ResultsQuery {
    #[validate(range(min = 1, message = "page starts at 1"))]
    #[serde(default = "default_page")]
    pub page: usize,
    #[validate(range(min = 1, max = 200, message = "per_page must be between 1 and 200"))]
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

impl Default for ResultsQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// One page of a finished search
#[derive(Debug, Serialize)]
pub struct ResultsPage {
    pub search_id: SearchId,
    pub jobs: Vec<Job>,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub sources_scraped: Vec<JobSource>,
    pub sources_failed: Vec<SourceFailure>,
    pub scraping_duration: f64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub search_id: SearchId,
    pub message: String,
}

/// Entry of the supported source listing
#[derive(Debug, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source: JobSource,
    pub available: bool,
    pub extended: bool,
}
