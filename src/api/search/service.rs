use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpResponse, ResponseError};
use tracing::{info, warn};

use super::dto::{ResultsPage, ResultsQuery, SearchAccepted, SourceInfo};
use crate::api::validation::ErrorResponse;
use crate::engine::coordinator::SearchCoordinator;
use crate::engine::error::SearchError;
use crate::engine::job::JobSource;
use crate::engine::progress::ScrapingProgress;
use crate::engine::search::{SearchFilters, SearchId, SearchStatus};
use crate::engine::stats::JobStats;

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// Coordinator rejected the operation
    Search(SearchError),

    /// Path id is not a search id
    InvalidId(String),

    /// Cancel on a search that already finished
    AlreadyFinished(SearchId),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Search(e) => write!(f, "{}", e),
            ServiceError::InvalidId(id) => write!(f, "search not found: {}", id),
            ServiceError::AlreadyFinished(id) => write!(f, "search {} already finished", id),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<SearchError> for ServiceError {
    fn from(e: SearchError) -> Self {
        ServiceError::Search(e)
    }
}

fn error_body(error: &str, message: impl Into<serde_json::Value>) -> ErrorResponse {
    ErrorResponse {
        error: error.to_string(),
        fields: serde_json::json!({ "message": message.into() }),
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Search(SearchError::Validation(msg)) => {
                warn!("Validation error: {}", msg);
                HttpResponse::BadRequest().json(error_body("Validation failed", msg.as_str()))
            }
            ServiceError::Search(SearchError::NotFound(id)) => {
                HttpResponse::NotFound().json(error_body(
                    "Not found",
                    format!("Search with id {} not found", id),
                ))
            }
            ServiceError::InvalidId(id) => HttpResponse::NotFound().json(error_body(
                "Not found",
                format!("Search with id {} not found", id),
            )),
            ServiceError::Search(SearchError::NotReady { id, status, reason }) => {
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Results not ready".to_string(),
                    fields: serde_json::json!({
                        "message": format!("Search {} is {}", id, status),
                        "status": status,
                        "reason": reason,
                    }),
                })
            }
            ServiceError::AlreadyFinished(id) => HttpResponse::Conflict().json(error_body(
                "Already finished",
                format!("Search {} already reached a terminal state", id),
            )),
            ServiceError::Search(SearchError::Busy) => HttpResponse::ServiceUnavailable()
                .json(error_body("Busy", "Too many searches queued, try again later")),
            ServiceError::Search(SearchError::ShuttingDown) => HttpResponse::ServiceUnavailable()
                .json(error_body("Unavailable", "Search service is shutting down")),
        }
    }
}

/// Search service between the HTTP handlers and the coordinator
pub struct SearchService {
    coordinator: Arc<SearchCoordinator>,
}

impl SearchService {
    pub fn new(coordinator: Arc<SearchCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<SearchCoordinator> {
        &self.coordinator
    }

    fn parse_id(raw: &str) -> Result<SearchId, ServiceError> {
        raw.parse()
            .map_err(|_| ServiceError::InvalidId(raw.to_string()))
    }

    pub fn start_search(&self, filters: SearchFilters) -> Result<SearchAccepted, ServiceError> {
        info!(
            "Service: starting {:?} search on {:?}",
            filters.category, filters.sources
        );
        let search_id = self.coordinator.start_search(filters)?;
        Ok(SearchAccepted {
            search_id,
            status: SearchStatus::Pending,
            message: "Search accepted".to_string(),
        })
    }

    /// Current progress, or the next change when `wait_secs` is given
    pub async fn progress(
        &self,
        raw_id: &str,
        wait_secs: Option<u64>,
    ) -> Result<ScrapingProgress, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        let progress = match wait_secs {
            Some(secs) if secs > 0 => {
                self.coordinator
                    .wait_for_progress(id, Duration::from_secs(secs))
                    .await?
            }
            _ => self.coordinator.progress(id)?,
        };
        Ok(progress)
    }

    pub fn results(&self, raw_id: &str, query: &ResultsQuery) -> Result<ResultsPage, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        let result = self.coordinator.result(id)?;

        let per_page = query.per_page.max(1);
        let page = query.page.max(1);
        let total_pages = result.total_count.div_ceil(per_page);
        let jobs = result
            .jobs
            .iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();

        Ok(ResultsPage {
            search_id: id,
            jobs,
            page,
            per_page,
            total_pages,
            total_count: result.total_count,
            sources_scraped: result.sources_scraped.clone(),
            sources_failed: result.sources_failed.clone(),
            scraping_duration: result.scraping_duration,
            completed_at: result.completed_at,
        })
    }

    pub fn stats(&self, raw_id: &str) -> Result<JobStats, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        Ok(self.coordinator.stats(id)?)
    }

    pub fn cancel(&self, raw_id: &str) -> Result<SearchId, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        if self.coordinator.cancel(id)? {
            Ok(id)
        } else {
            Err(ServiceError::AlreadyFinished(id))
        }
    }

    pub fn sources(&self) -> Vec<SourceInfo> {
        let adapters = self.coordinator.adapters();
        JobSource::ALL
            .into_iter()
            .map(|source| SourceInfo {
                source,
                available: adapters.contains(source),
                extended: source == JobSource::GoogleDorks,
            })
            .collect()
    }
}
