use std::time::Duration;

use serde::Serialize;

use super::job::JobSource;
use super::search::{SearchId, SearchStatus};

/// Failure of a single source, never fatal for the whole search
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("authentication required: {0}")]
    AuthRequired(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("could not parse source response: {0}")]
    ParseError(String),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Timeout,
    AuthRequired,
    RateLimited,
    ParseError,
    Unavailable,
}

impl SourceError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::Timeout(_) => SourceErrorKind::Timeout,
            SourceError::AuthRequired(_) => SourceErrorKind::AuthRequired,
            SourceError::RateLimited(_) => SourceErrorKind::RateLimited,
            SourceError::ParseError(_) => SourceErrorKind::ParseError,
            SourceError::Unavailable(_) => SourceErrorKind::Unavailable,
        }
    }
}

/// Source failure as surfaced to clients in progress and results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: JobSource,
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceFailure {
    pub fn new(source: JobSource, error: &SourceError) -> Self {
        Self {
            source,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Structural failures that abort a search
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("none of the requested sources has a registered adapter")]
    NoValidSources,
    #[error("all {0} sources failed")]
    AllSourcesFailed(usize),
    #[error("search cancelled: {0}")]
    Cancelled(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors returned to callers of the coordinator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search request: {0}")]
    Validation(String),
    #[error("search not found: {0}")]
    NotFound(SearchId),
    #[error("search {id} is not ready (status: {status})")]
    NotReady {
        id: SearchId,
        status: SearchStatus,
        reason: Option<String>,
    },
    #[error("too many searches queued, try again later")]
    Busy,
    #[error("search service is shutting down")]
    ShuttingDown,
}
