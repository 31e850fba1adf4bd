use chrono::{DateTime, Utc};
use tracing::debug;

use super::job::{Job, SourcePriority};
use super::search::SearchFilters;
use super::terms::PhraseMatcher;

/// Splits free-text keywords into phrases: comma separated when a comma is
/// present, otherwise one phrase per word.
pub fn keyword_phrases(keywords: &str) -> Vec<String> {
    let parts: Vec<&str> = if keywords.contains(',') {
        keywords.split(',').collect()
    } else {
        keywords.split_whitespace().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Applies the boolean refinements, experience level, time window and
/// keyword match of `filters`. `started_at` anchors the time window.
pub fn apply(
    filters: &SearchFilters,
    jobs: Vec<Job>,
    started_at: DateTime<Utc>,
) -> Result<Vec<Job>, regex::Error> {
    let keywords = match filters.keywords.as_deref() {
        Some(k) => {
            let phrases = keyword_phrases(k);
            if phrases.is_empty() {
                None
            } else {
                Some(PhraseMatcher::new(&phrases)?)
            }
        }
        None => None,
    };
    let oldest = started_at - filters.time_filter.window();
    let before = jobs.len();

    let kept: Vec<Job> = jobs
        .into_iter()
        .filter(|job| !filters.remote_only || job.remote_friendly)
        .filter(|job| !filters.exclude_citizenship_required || !job.citizenship_required)
        .filter(|job| !filters.f1_student_friendly || job.f1_student_friendly)
        .filter(|job| !filters.exclude_easy_apply || !job.easy_apply)
        .filter(|job| filters.experience_level.accepts(job.experience_level))
        .filter(|job| job.posted_date >= oldest)
        .filter(|job| {
            keywords.as_ref().map_or(true, |matcher| {
                matcher.is_match(&format!("{}\n{}", job.title, job.description))
            })
        })
        .collect();

    debug!("Filters kept {} of {} jobs", kept.len(), before);
    Ok(kept)
}

/// Newest first, then by source priority. The sort is stable so discovery
/// order breaks the remaining ties.
pub fn order(jobs: &mut [Job], priority: &SourcePriority) {
    jobs.sort_by(|a, b| {
        b.posted_date
            .cmp(&a.posted_date)
            .then_with(|| priority.rank(a.source).cmp(&priority.rank(b.source)))
    });
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::engine::classifier::Classifier;
    use crate::engine::job::{ExperienceFilter, JobCategory, JobSource, RawPosting, TimeFilter};
    use crate::engine::terms::TermSets;

    fn job(source: JobSource, title: &str, description: &str, age: Duration, now: DateTime<Utc>) -> Job {
        let classifier = Classifier::new(&TermSets::default()).unwrap();
        classifier.classify(
            source,
            &RawPosting {
                title: title.into(),
                company: "Acme".into(),
                location: "Denver, CO".into(),
                description: description.into(),
                posted_date: Some(now - age),
                ..Default::default()
            },
            now,
            now,
        )
    }

    fn filters() -> SearchFilters {
        SearchFilters::new(JobCategory::SoftwareEngineering, vec![JobSource::Indeed])
    }

    #[test]
    fn keyword_phrases_split_on_commas_first() {
        assert_eq!(keyword_phrases("rust, security engineer"), vec!["rust", "security engineer"]);
        assert_eq!(keyword_phrases("rust  go"), vec!["rust", "go"]);
        assert!(keyword_phrases(" , ").is_empty());
    }

    #[test]
    fn boolean_refinements_filter_jobs() {
        let now = Utc::now();
        let jobs = vec![
            job(JobSource::Indeed, "Backend Engineer", "Fully remote role", Duration::hours(1), now),
            job(JobSource::Indeed, "Security Engineer", "Must be a US citizen", Duration::hours(1), now),
            job(JobSource::Indeed, "Frontend Engineer", "Easy Apply today", Duration::hours(1), now),
        ];

        let mut f = filters();
        f.remote_only = true;
        assert_eq!(apply(&f, jobs.clone(), now).unwrap().len(), 1);

        let mut f = filters();
        f.exclude_citizenship_required = true;
        f.exclude_easy_apply = true;
        let kept = apply(&f, jobs, now).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Backend Engineer");
    }

    #[test]
    fn experience_and_time_window() {
        let now = Utc::now();
        let jobs = vec![
            job(JobSource::Indeed, "Senior Engineer", "", Duration::hours(2), now),
            job(JobSource::Indeed, "Junior Engineer", "", Duration::hours(2), now),
            job(JobSource::Indeed, "Engineer", "", Duration::days(3), now),
        ];

        let mut f = filters();
        f.experience_level = ExperienceFilter::Senior;
        f.time_filter = TimeFilter::Hours24;
        let kept = apply(&f, jobs, now).unwrap();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Senior Engineer");
    }

    #[test]
    fn keyword_match_is_phrase_bounded() {
        let now = Utc::now();
        let jobs = vec![
            job(JobSource::Indeed, "Rust Developer", "", Duration::hours(1), now),
            job(JobSource::Indeed, "Trusted Advisor", "", Duration::hours(1), now),
        ];
        let mut f = filters();
        f.keywords = Some("rust".into());
        let kept = apply(&f, jobs, now).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Rust Developer");
    }

    #[test]
    fn order_by_date_then_priority() {
        let now = Utc::now();
        let mut jobs = vec![
            job(JobSource::Indeed, "A", "", Duration::hours(5), now),
            job(JobSource::Indeed, "B", "", Duration::hours(1), now),
            job(JobSource::Dice, "C", "", Duration::hours(1), now),
        ];
        let priority: SourcePriority = "dice,indeed".parse().unwrap();
        order(&mut jobs, &priority);
        let titles: Vec<&str> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "B", "A"]);
    }
}
