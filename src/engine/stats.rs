use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::job::{ExperienceLevel, Job, JobSource};

const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

/// Summary of a finalized job set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub total_jobs: usize,
    pub by_source: BTreeMap<JobSource, usize>,
    pub by_experience_level: BTreeMap<ExperienceLevel, usize>,
    pub by_location: BTreeMap<String, usize>,
    pub by_company: BTreeMap<String, usize>,
    pub top_locations: Vec<NamedCount>,
    pub top_companies: Vec<NamedCount>,
    pub remote_jobs: usize,
    pub visa_sponsorship_jobs: usize,
    pub security_clearance_jobs: usize,
    pub citizenship_required_jobs: usize,
    pub f1_student_friendly_jobs: usize,
    pub easy_apply_jobs: usize,
    /// Days between posting and `as_of`, averaged
    pub average_posting_age: f64,
}

fn label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

fn top(counts: &BTreeMap<String, usize>) -> Vec<NamedCount> {
    let mut entries: Vec<NamedCount> = counts
        .iter()
        .map(|(name, count)| NamedCount {
            name: name.clone(),
            count: *count,
        })
        .collect();
    // BTreeMap iteration already orders names, the sort is stable
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(TOP_N);
    entries
}

/// Pure aggregation over `jobs`; `as_of` is the reference time for posting age.
pub fn compute(jobs: &[Job], as_of: DateTime<Utc>) -> JobStats {
    let mut stats = JobStats {
        total_jobs: jobs.len(),
        ..Default::default()
    };
    let mut total_age_secs = 0i64;

    for job in jobs {
        *stats.by_source.entry(job.source).or_default() += 1;
        if let Some(level) = job.experience_level {
            *stats.by_experience_level.entry(level).or_default() += 1;
        }
        *stats.by_location.entry(label(&job.location)).or_default() += 1;
        *stats.by_company.entry(label(&job.company)).or_default() += 1;

        stats.remote_jobs += job.remote_friendly as usize;
        stats.visa_sponsorship_jobs += job.visa_sponsorship as usize;
        stats.security_clearance_jobs += job.security_clearance_required as usize;
        stats.citizenship_required_jobs += job.citizenship_required as usize;
        stats.f1_student_friendly_jobs += job.f1_student_friendly as usize;
        stats.easy_apply_jobs += job.easy_apply as usize;

        total_age_secs += (as_of - job.posted_date).num_seconds().max(0);
    }

    stats.top_locations = top(&stats.by_location);
    stats.top_companies = top(&stats.by_company);
    if !jobs.is_empty() {
        stats.average_posting_age = total_age_secs as f64 / 86_400.0 / jobs.len() as f64;
    }
    stats
}
