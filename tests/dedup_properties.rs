use std::collections::HashSet;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use job_aggregator::engine::dedup::{dedupe, job_identity, Deduplicator};
use job_aggregator::engine::{Classifier, Job, JobSource, RawPosting, SourcePriority, TermSets};

const SOURCES: [JobSource; 3] = [JobSource::Indeed, JobSource::Linkedin, JobSource::Dice];
const TITLES: [&str; 3] = ["Security Analyst", "SOC Engineer", "Pen Tester"];
const COMPANIES: [&str; 2] = ["Acme Inc.", "Globex LLC"];

/// (source, title, company, url slot or none, description length, age in hours)
type Shape = (usize, usize, usize, Option<u8>, usize, i64);

fn shape() -> impl Strategy<Value = Shape> {
    (
        0..SOURCES.len(),
        0..TITLES.len(),
        0..COMPANIES.len(),
        proptest::option::of(0u8..4),
        0usize..40,
        0i64..100,
    )
}

fn build(classifier: &Classifier, shape: &Shape) -> Job {
    let (source, title, company, url, description, age) = *shape;
    let at = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
    classifier.classify(
        SOURCES[source],
        &RawPosting {
            title: TITLES[title].to_string(),
            company: COMPANIES[company].to_string(),
            location: "Remote".to_string(),
            description: "x".repeat(description),
            url: url.map(|slot| format!("https://jobs.example.com/{}/", slot)),
            posted_date: Some(at - Duration::hours(age)),
            ..Default::default()
        },
        at,
        at,
    )
}

/// Stages each source's batch in `arrival` order and finalizes
fn run(jobs: &[Job], arrival: &[JobSource], priority: &SourcePriority) -> Vec<Job> {
    let mut dedup = Deduplicator::new();
    for source in arrival {
        let batch: Vec<Job> = jobs.iter().filter(|j| j.source == *source).cloned().collect();
        dedup.stage(*source, batch);
    }
    dedup.finalize(priority)
}

proptest! {
    #[test]
    fn finalized_set_ignores_arrival_order(
        shapes in proptest::collection::vec(shape(), 0..30),
        arrival in Just(SOURCES.to_vec()).prop_shuffle(),
    ) {
        let classifier = Classifier::new(&TermSets::default()).unwrap();
        let jobs: Vec<Job> = shapes.iter().map(|s| build(&classifier, s)).collect();
        let priority = SourcePriority::default();

        let canonical = run(&jobs, &SOURCES, &priority);
        let shuffled = run(&jobs, &arrival, &priority);
        prop_assert_eq!(&canonical, &shuffled);

        let keys: HashSet<String> = canonical.iter().map(job_identity).collect();
        prop_assert_eq!(keys.len(), canonical.len());

        prop_assert_eq!(dedupe(canonical.clone()), canonical);
    }
}
