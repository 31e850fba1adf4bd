use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::error::SourceFailure;
use super::job::{ExperienceFilter, Job, JobCategory, JobSource, TimeFilter};
use super::stats::JobStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchId(Uuid);

impl SearchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for SearchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SearchId)
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally visible search status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Pending => "pending",
            SearchStatus::Running => "running",
            SearchStatus::Completed => "completed",
            SearchStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchStatus::Completed | SearchStatus::Failed)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coordinator-internal lifecycle of one search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Created,
    Dispatching,
    AwaitingCompletions,
    Finalizing,
    Done,
    Aborted,
}

impl SearchPhase {
    pub fn status(&self) -> SearchStatus {
        match self {
            SearchPhase::Created => SearchStatus::Pending,
            SearchPhase::Dispatching
            | SearchPhase::AwaitingCompletions
            | SearchPhase::Finalizing => SearchStatus::Running,
            SearchPhase::Done => SearchStatus::Completed,
            SearchPhase::Aborted => SearchStatus::Failed,
        }
    }
}

/// Credential for the extended search source, never logged or echoed back
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

fn default_location() -> String {
    "United States".to_string()
}

fn default_max_pages() -> u32 {
    3
}

/// Normalized search request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchFilters {
    pub category: JobCategory,
    #[validate(length(max = 200, message = "Keywords must be at most 200 characters"))]
    #[serde(default)]
    pub keywords: Option<String>,
    #[validate(length(max = 120, message = "Location must be at most 120 characters"))]
    #[serde(default = "default_location")]
    pub location: String,
    #[validate(length(min = 1, message = "At least one source must be selected"))]
    pub sources: Vec<JobSource>,
    #[serde(default)]
    pub experience_level: ExperienceFilter,
    #[serde(default)]
    pub time_filter: TimeFilter,
    #[serde(default = "default_max_pages", alias = "max_pages")]
    pub max_pages_per_source: u32,
    #[serde(default)]
    pub exclude_citizenship_required: bool,
    #[serde(default)]
    pub f1_student_friendly: bool,
    #[serde(default)]
    pub remote_only: bool,
    #[serde(default)]
    pub exclude_easy_apply: bool,
    #[serde(default)]
    pub use_extended_search: bool,
    #[serde(default, skip_serializing)]
    pub extended_search_key: Option<Credential>,
}

impl SearchFilters {
    pub fn new(category: JobCategory, sources: Vec<JobSource>) -> Self {
        Self {
            category,
            keywords: None,
            location: default_location(),
            sources,
            experience_level: ExperienceFilter::All,
            time_filter: TimeFilter::default(),
            max_pages_per_source: default_max_pages(),
            exclude_citizenship_required: false,
            f1_student_friendly: false,
            remote_only: false,
            exclude_easy_apply: false,
            use_extended_search: false,
            extended_search_key: None,
        }
    }

    /// Deduplicates sources (keeping request order), adds the extended search
    /// source when asked for and clamps the page budget.
    pub fn normalize(mut self, min_pages: u32, max_pages: u32) -> Self {
        let mut seen = Vec::with_capacity(self.sources.len() + 1);
        for source in self.sources.drain(..) {
            if !seen.contains(&source) {
                seen.push(source);
            }
        }
        if self.use_extended_search && !seen.contains(&JobSource::GoogleDorks) {
            seen.push(JobSource::GoogleDorks);
        }
        self.sources = seen;
        self.max_pages_per_source = self.max_pages_per_source.clamp(min_pages, max_pages);
        self.keywords = self
            .keywords
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.location = self.location.trim().to_string();
        self
    }
}

/// Finalized output of a completed search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub search_id: SearchId,
    pub jobs: Vec<Job>,
    pub total_count: usize,
    pub filters_applied: SearchFilters,
    pub sources_scraped: Vec<JobSource>,
    pub sources_failed: Vec<SourceFailure>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Seconds
    pub scraping_duration: f64,
    pub stats: JobStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_pages_and_adds_extended_source() {
        let mut filters = SearchFilters::new(
            JobCategory::Cybersecurity,
            vec![JobSource::Indeed, JobSource::Indeed, JobSource::Dice],
        );
        filters.max_pages_per_source = 50;
        filters.use_extended_search = true;
        filters.keywords = Some("   ".into());

        let filters = filters.normalize(1, 10);

        assert_eq!(
            filters.sources,
            vec![JobSource::Indeed, JobSource::Dice, JobSource::GoogleDorks]
        );
        assert_eq!(filters.max_pages_per_source, 10);
        assert_eq!(filters.keywords, None);
    }

    #[test]
    fn empty_sources_fail_validation() {
        let filters = SearchFilters::new(JobCategory::SoftwareEngineering, vec![]);
        assert!(filters.validate().is_err());
    }

    #[test]
    fn credential_is_redacted_and_not_serialized() {
        let mut filters = SearchFilters::new(JobCategory::Cybersecurity, vec![JobSource::Dice]);
        filters.extended_search_key = Some(Credential::new("secret-key"));

        assert!(!format!("{:?}", filters).contains("secret-key"));
        let json = serde_json::to_string(&filters).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(!json.contains("extended_search_key"));
    }

    #[test]
    fn request_defaults_fill_optional_fields() {
        let filters: SearchFilters = serde_json::from_str(
            r#"{"category": "software-engineering", "sources": ["indeed"]}"#,
        )
        .unwrap();

        assert_eq!(filters.location, "United States");
        assert_eq!(filters.max_pages_per_source, 3);
        assert_eq!(filters.time_filter, TimeFilter::Days7);
        assert_eq!(filters.experience_level, ExperienceFilter::All);
    }

    #[test]
    fn phase_maps_to_external_status() {
        assert_eq!(SearchPhase::Created.status(), SearchStatus::Pending);
        assert_eq!(SearchPhase::Finalizing.status(), SearchStatus::Running);
        assert_eq!(SearchPhase::Aborted.status(), SearchStatus::Failed);
        assert!(SearchPhase::Done.status().is_terminal());
    }
}
