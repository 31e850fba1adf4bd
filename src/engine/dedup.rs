use std::collections::{BTreeMap, HashMap, HashSet};

use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use super::classifier::Flags;
use super::job::{Job, JobSource, SourcePriority};

/// Query parameters that identify a posting rather than track a click
const IDENTIFYING_PARAMS: &[&str] = &[
    "jk",
    "id",
    "jobid",
    "job_id",
    "jid",
    "gh_jid",
    "currentjobid",
    "req",
    "reqid",
    "requisitionid",
    "posting_id",
    "position",
];

const COMPANY_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "llc",
    "corp",
    "corporation",
    "ltd",
    "limited",
    "co",
    "company",
    "llp",
    "plc",
    "gmbh",
    "ag",
];

/// Lower-cases, folds punctuation to spaces and collapses whitespace
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Like [`normalize_text`], also dropping trailing legal-form suffixes
pub fn normalize_company(company: &str) -> String {
    let normalized = normalize_text(company);
    let mut words: Vec<&str> = normalized.split(' ').collect();
    while words.len() > 1 && words.last().is_some_and(|w| COMPANY_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

/// Host and path without scheme, fragment, tracking query or trailing
/// slash. `None` when the url is not an absolute url with a host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    let mut identifying: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
        .filter(|(k, v)| IDENTIFYING_PARAMS.contains(&k.as_str()) && !v.is_empty())
        .collect();
    identifying.sort();

    let mut key = format!("{}{}", host, parsed.path().trim_end_matches('/').to_lowercase());
    if !identifying.is_empty() {
        let query: Vec<String> = identifying.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        key.push('?');
        key.push_str(&query.join("&"));
    }
    Some(key)
}

/// Key used to detect duplicate postings across and within sources
pub fn identity_key(url: Option<&str>, title: &str, company: &str, location: &str) -> String {
    match url.and_then(normalize_url) {
        Some(normalized) => format!("url:{}", normalized),
        None => format!(
            "job:{}|{}|{}",
            normalize_text(title),
            normalize_company(company),
            normalize_text(location)
        ),
    }
}

pub fn job_identity(job: &Job) -> String {
    identity_key(job.url.as_deref(), &job.title, &job.company, &job.location)
}

/// Stable job id derived from the source and the identity key
pub fn job_id(
    source: JobSource,
    url: Option<&str>,
    title: &str,
    company: &str,
    location: &str,
) -> String {
    let key = identity_key(url, title, company, location);
    let digest = Sha256::digest(format!("{}|{}", source, key).as_bytes());
    hex::encode(&digest[..16])
}

/// Folds `other` into `winner`, which keeps its identity and position.
fn merge(winner: &mut Job, other: Job) {
    let longer = other.description.chars().count() > winner.description.chars().count();
    if longer {
        // Flags are derived from the description, keep them together.
        winner.description = other.description;
        winner.remote_friendly = other.remote_friendly;
        winner.visa_sponsorship = other.visa_sponsorship;
        winner.security_clearance_required = other.security_clearance_required;
        winner.citizenship_required = other.citizenship_required;
        winner.f1_student_friendly = other.f1_student_friendly;
    }
    winner.easy_apply |= other.easy_apply;
    winner.sponsored |= other.sponsored;
    if other.posted_date < winner.posted_date {
        winner.posted_date = other.posted_date;
    }
    if winner.url.is_none() {
        winner.url = other.url;
    }
    if winner.salary_range.is_none() {
        winner.salary_range = other.salary_range;
    }
    if winner.experience_level.is_none() {
        winner.experience_level = other.experience_level;
    }

    let mut also = winner.also_posted_on.clone();
    also.push(other.source);
    also.extend(other.also_posted_on);
    also.retain(|s| *s != winner.source);
    also.sort();
    also.dedup();
    winner.also_posted_on = also;

    winner.classification_tags = Flags::from(&*winner).tags();
}

/// Collapses duplicates in sequence order: the first job for a key wins and
/// later ones are merged into it.
pub fn dedupe(jobs: impl IntoIterator<Item = Job>) -> Vec<Job> {
    let mut unique: Vec<Job> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for job in jobs {
        let key = job_identity(&job);
        match positions.get(&key) {
            Some(&index) => {
                debug!("Merging duplicate posting {} from {}", key, job.source);
                merge(&mut unique[index], job);
            }
            None => {
                positions.insert(key, unique.len());
                unique.push(job);
            }
        }
    }
    unique
}

/// Staging area for one search.
///
/// Each source's jobs are kept in discovery order with pagination overlap
/// removed. Cross-source collapsing happens in [`Deduplicator::finalize`],
/// walking sources in priority order, so the output does not depend on which
/// source finished first.
#[derive(Debug, Default)]
pub struct Deduplicator {
    staged: BTreeMap<JobSource, Vec<Job>>,
    keys: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a batch and returns how many keys were not seen before.
    pub fn stage(&mut self, source: JobSource, jobs: Vec<Job>) -> usize {
        let before = self.keys.len();
        for job in &jobs {
            self.keys.insert(job_identity(job));
        }

        let entry = self.staged.entry(source).or_default();
        let mut combined = std::mem::take(entry);
        combined.extend(jobs);
        *entry = dedupe(combined);

        self.keys.len() - before
    }

    /// Distinct postings staged so far, across all sources
    pub fn unique_count(&self) -> usize {
        self.keys.len()
    }

    pub fn finalize(mut self, priority: &SourcePriority) -> Vec<Job> {
        let sources = priority.sorted(self.staged.keys().copied());
        let ordered = sources
            .into_iter()
            .filter_map(|source| self.staged.remove(&source))
            .flatten();
        dedupe(ordered)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::engine::classifier::Classifier;
    use crate::engine::job::RawPosting;
    use crate::engine::terms::TermSets;

    fn job(source: JobSource, title: &str, url: Option<&str>, description: &str) -> Job {
        let classifier = Classifier::new(&TermSets::default()).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        classifier.classify(
            source,
            &RawPosting {
                title: title.into(),
                company: "Acme Inc.".into(),
                location: "Austin, TX".into(),
                description: description.into(),
                url: url.map(String::from),
                ..Default::default()
            },
            at,
            at,
        )
    }

    #[test]
    fn url_normalization_strips_noise() {
        assert_eq!(
            normalize_url("HTTPS://Jobs.Acme.com/Careers/123/?utm_source=x#apply"),
            Some("jobs.acme.com/careers/123".to_string())
        );
        assert_eq!(
            normalize_url("http://jobs.acme.com/careers/123"),
            normalize_url("https://jobs.acme.com/careers/123/")
        );
        assert_eq!(normalize_url("not a url"), None);
    }

    #[test]
    fn url_normalization_keeps_identifying_params() {
        let a = normalize_url("https://www.indeed.com/viewjob?jk=abc&from=serp").unwrap();
        let b = normalize_url("https://www.indeed.com/viewjob?jk=def").unwrap();
        assert_eq!(a, "www.indeed.com/viewjob?jk=abc");
        assert_ne!(a, b);
    }

    #[test]
    fn triple_key_folds_case_whitespace_and_company_suffix() {
        let a = identity_key(None, "Senior  Engineer", "Acme, Inc.", "Austin, TX");
        let b = identity_key(Some("::bad::"), "senior engineer", "ACME", "austin tx");
        assert_eq!(a, b);
    }

    #[test]
    fn job_id_depends_on_source() {
        let a = job_id(JobSource::Indeed, Some("https://acme.com/1"), "t", "c", "l");
        let b = job_id(JobSource::Dice, Some("https://acme.com/1"), "t", "c", "l");
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert_eq!(a, job_id(JobSource::Indeed, Some("https://acme.com/1/"), "x", "y", "z"));
    }

    #[test]
    fn merge_prefers_longer_description_and_earliest_date() {
        let first = job(JobSource::Indeed, "Engineer", Some("https://acme.com/1"), "short");
        let mut second = job(
            JobSource::Dice,
            "Engineer",
            Some("https://acme.com/1/"),
            "a much longer description, fully remote",
        );
        second.posted_date = first.posted_date - Duration::days(2);

        let merged = dedupe(vec![first.clone(), second.clone()]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, first.id);
        assert_eq!(merged[0].source, JobSource::Indeed);
        assert_eq!(merged[0].description, second.description);
        assert!(merged[0].remote_friendly);
        assert_eq!(merged[0].posted_date, second.posted_date);
        assert_eq!(merged[0].also_posted_on, vec![JobSource::Dice]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let jobs = vec![
            job(JobSource::Indeed, "Engineer", Some("https://acme.com/1"), "a"),
            job(JobSource::Dice, "Engineer", Some("https://acme.com/1"), "ab"),
            job(JobSource::Dice, "Analyst", None, "c"),
        ];
        let once = dedupe(jobs);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn staging_counts_new_keys_only() {
        let mut dedup = Deduplicator::new();
        let a = job(JobSource::Indeed, "Engineer", Some("https://acme.com/1"), "");
        let b = job(JobSource::Indeed, "Analyst", Some("https://acme.com/2"), "");

        assert_eq!(dedup.stage(JobSource::Indeed, vec![a.clone(), b, a.clone()]), 2);
        let cross = job(JobSource::Dice, "Engineer", Some("https://acme.com/1"), "");
        assert_eq!(dedup.stage(JobSource::Dice, vec![cross]), 0);
        assert_eq!(dedup.unique_count(), 2);
    }

    #[test]
    fn finalize_ignores_completion_order() {
        let indeed = vec![job(JobSource::Indeed, "Engineer", Some("https://acme.com/1"), "x")];
        let dice = vec![
            job(JobSource::Dice, "Engineer", Some("https://acme.com/1"), "longer text"),
            job(JobSource::Dice, "Analyst", None, ""),
        ];
        let priority = SourcePriority::default();

        let mut forward = Deduplicator::new();
        forward.stage(JobSource::Indeed, indeed.clone());
        forward.stage(JobSource::Dice, dice.clone());

        let mut backward = Deduplicator::new();
        backward.stage(JobSource::Dice, dice);
        backward.stage(JobSource::Indeed, indeed);

        assert_eq!(forward.finalize(&priority), backward.finalize(&priority));
    }
}
