use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Job boards a search can fan out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobSource {
    Indeed,
    Linkedin,
    Glassdoor,
    Ziprecruiter,
    Dice,
    Wellfound,
    GoogleDorks,
}

impl JobSource {
    pub const ALL: [JobSource; 7] = [
        JobSource::Indeed,
        JobSource::Linkedin,
        JobSource::Glassdoor,
        JobSource::Ziprecruiter,
        JobSource::Dice,
        JobSource::Wellfound,
        JobSource::GoogleDorks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::Indeed => "indeed",
            JobSource::Linkedin => "linkedin",
            JobSource::Glassdoor => "glassdoor",
            JobSource::Ziprecruiter => "ziprecruiter",
            JobSource::Dice => "dice",
            JobSource::Wellfound => "wellfound",
            JobSource::GoogleDorks => "google-dorks",
        }
    }
}

impl FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        JobSource::ALL
            .into_iter()
            .find(|source| source.as_str() == wanted)
            .ok_or_else(|| format!("Invalid job source: {}", s))
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobCategory {
    Cybersecurity,
    SoftwareEngineering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Lead,
    Executive,
}

/// Experience level requested by a search, `all` disables the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceFilter {
    #[default]
    All,
    Entry,
    Mid,
    Senior,
    Lead,
    Executive,
}

impl ExperienceFilter {
    pub fn level(&self) -> Option<ExperienceLevel> {
        match self {
            ExperienceFilter::All => None,
            ExperienceFilter::Entry => Some(ExperienceLevel::Entry),
            ExperienceFilter::Mid => Some(ExperienceLevel::Mid),
            ExperienceFilter::Senior => Some(ExperienceLevel::Senior),
            ExperienceFilter::Lead => Some(ExperienceLevel::Lead),
            ExperienceFilter::Executive => Some(ExperienceLevel::Executive),
        }
    }

    /// Jobs without an inferred level are never excluded.
    pub fn accepts(&self, level: Option<ExperienceLevel>) -> bool {
        match (self.level(), level) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(actual)) => wanted == actual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeFilter {
    #[serde(rename = "12h")]
    Hours12,
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "3d")]
    Days3,
    #[default]
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "14d")]
    Days14,
    #[serde(rename = "30d")]
    Days30,
}

impl TimeFilter {
    pub fn window(&self) -> Duration {
        match self {
            TimeFilter::Hours12 => Duration::hours(12),
            TimeFilter::Hours24 => Duration::hours(24),
            TimeFilter::Days3 => Duration::days(3),
            TimeFilter::Days7 => Duration::days(7),
            TimeFilter::Days14 => Duration::days(14),
            TimeFilter::Days30 => Duration::days(30),
        }
    }
}

/// Configured ordering among sources, used for deterministic tie-breaks.
/// Sources missing from the list rank after listed ones, in enum order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePriority(Vec<JobSource>);

impl SourcePriority {
    pub fn new(order: Vec<JobSource>) -> Self {
        let mut deduped = Vec::with_capacity(order.len());
        for source in order {
            if !deduped.contains(&source) {
                deduped.push(source);
            }
        }
        Self(deduped)
    }

    pub fn rank(&self, source: JobSource) -> usize {
        self.0
            .iter()
            .position(|s| *s == source)
            .unwrap_or_else(|| self.0.len() + source as usize)
    }

    /// Returns `sources` sorted by rank
    pub fn sorted(&self, sources: impl IntoIterator<Item = JobSource>) -> Vec<JobSource> {
        let mut sorted: Vec<JobSource> = sources.into_iter().collect();
        sorted.sort_by_key(|s| self.rank(*s));
        sorted
    }
}

impl Default for SourcePriority {
    fn default() -> Self {
        Self(JobSource::ALL.to_vec())
    }
}

impl FromStr for SourcePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let order = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<JobSource>, _>>()?;
        Ok(Self::new(order))
    }
}

/// One posting exactly as a source adapter returned it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub posted_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub salary_range: Option<String>,
    /// Source marked the listing as quick/easy apply
    #[serde(default)]
    pub easy_apply: bool,
    /// Source marked the listing as promoted
    #[serde(default)]
    pub sponsored: bool,
}

/// Canonical, classified posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: Option<String>,
    pub source: JobSource,
    pub posted_date: DateTime<Utc>,
    pub experience_level: Option<ExperienceLevel>,
    pub salary_range: Option<String>,
    pub classification_tags: Vec<String>,
    pub sponsored: bool,
    pub remote_friendly: bool,
    pub visa_sponsorship: bool,
    pub security_clearance_required: bool,
    pub citizenship_required: bool,
    pub f1_student_friendly: bool,
    pub easy_apply: bool,
    /// Other sources that carried the same opening
    pub also_posted_on: Vec<JobSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_names_round_trip_through_from_str() {
        for source in JobSource::ALL {
            assert_eq!(source.as_str().parse::<JobSource>(), Ok(source));
        }
        assert!("monster".parse::<JobSource>().is_err());
    }

    #[test]
    fn source_serializes_kebab_case() {
        let json = serde_json::to_string(&JobSource::GoogleDorks).unwrap();
        assert_eq!(json, "\"google-dorks\"");
    }

    #[test]
    fn time_filter_uses_short_window_names() {
        let filter: TimeFilter = serde_json::from_str("\"12h\"").unwrap();
        assert_eq!(filter, TimeFilter::Hours12);
        assert_eq!(filter.window(), Duration::hours(12));
    }

    #[test]
    fn priority_ranks_unlisted_sources_last() {
        let priority: SourcePriority = "dice, linkedin".parse().unwrap();
        assert_eq!(priority.rank(JobSource::Dice), 0);
        assert_eq!(priority.rank(JobSource::Linkedin), 1);
        assert!(priority.rank(JobSource::Indeed) > 1);
        assert_eq!(
            priority.sorted([JobSource::Indeed, JobSource::Linkedin, JobSource::Dice]),
            vec![JobSource::Dice, JobSource::Linkedin, JobSource::Indeed]
        );
        assert!("dice,monster".parse::<SourcePriority>().is_err());
    }

    #[test]
    fn experience_filter_keeps_unknown_levels() {
        assert!(ExperienceFilter::Senior.accepts(None));
        assert!(ExperienceFilter::Senior.accepts(Some(ExperienceLevel::Senior)));
        assert!(!ExperienceFilter::Senior.accepts(Some(ExperienceLevel::Entry)));
        assert!(ExperienceFilter::All.accepts(Some(ExperienceLevel::Entry)));
    }
}
