use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream;
use rand::Rng;
use tracing::info;

use crate::engine::error::SourceError;
use crate::engine::job::{JobCategory, JobSource, RawPosting};
use crate::engine::source::{FetchRequest, PostingStream, SourceAdapter};

const POSTINGS_PER_PAGE: usize = 5;

const CYBER_TITLES: &[&str] = &[
    "Security Analyst",
    "Senior Penetration Tester",
    "SOC Analyst Intern",
    "Lead Incident Responder",
    "Cloud Security Engineer",
];

const SOFTWARE_TITLES: &[&str] = &[
    "Software Engineer",
    "Senior Backend Engineer",
    "Junior Frontend Developer",
    "Staff Platform Engineer",
    "Mid-Level Rust Developer",
];

const COMPANIES: &[&str] = &["Acme Corp", "Globex", "Initech LLC", "Umbrella Inc.", "Hooli"];

const DESCRIPTIONS: &[&str] = &[
    "Fully remote team, we offer visa sponsorship for the right candidate.",
    "Must be a U.S. citizen and able to obtain a secret clearance.",
    "Hybrid role in our downtown office. OPT and CPT candidates welcome.",
    "On-site position. Easy Apply in under a minute.",
    "Work from anywhere. H-1B transfers considered.",
];

/// Demo adapter that invents postings after a random delay and fails at a
/// configurable rate.
pub struct SimulatedAdapter {
    source: JobSource,
    /// Latency range in milliseconds
    latency_ms: (u64, u64),
    /// Percent of fetches that fail
    failure_rate: u32,
}

impl SimulatedAdapter {
    pub fn new(source: JobSource) -> Self {
        Self {
            source,
            latency_ms: (500, 3000),
            failure_rate: 20,
        }
    }

    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.latency_ms = (min_ms.min(max_ms), max_ms.max(min_ms));
        self
    }

    pub fn with_failure_rate(mut self, percent: u32) -> Self {
        self.failure_rate = percent.min(100);
        self
    }

    fn generate(&self, request: &FetchRequest, rng: &mut impl Rng) -> Vec<RawPosting> {
        let titles = match request.category {
            JobCategory::Cybersecurity => CYBER_TITLES,
            JobCategory::SoftwareEngineering => SOFTWARE_TITLES,
        };
        let window_mins = request.time_filter.window().num_minutes().max(1);
        let now = Utc::now();

        (0..request.max_pages as usize * POSTINGS_PER_PAGE)
            .map(|i| {
                let title = titles[rng.gen_range(0..titles.len())];
                let company = COMPANIES[rng.gen_range(0..COMPANIES.len())];
                let age = chrono::Duration::minutes(rng.gen_range(0..window_mins));
                RawPosting {
                    title: title.to_string(),
                    company: company.to_string(),
                    location: request.location.clone(),
                    description: DESCRIPTIONS[rng.gen_range(0..DESCRIPTIONS.len())].to_string(),
                    url: Some(format!(
                        "https://{}.example.com/jobs/{}-{}",
                        self.source,
                        rng.gen_range(1000..10000),
                        i
                    )),
                    posted_date: Some(now - age),
                    salary_range: None,
                    easy_apply: rng.gen_bool(0.2),
                    sponsored: rng.gen_bool(0.1),
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for SimulatedAdapter {
    fn source(&self) -> JobSource {
        self.source
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<PostingStream, SourceError> {
        if self.source == JobSource::GoogleDorks
            && request
                .credential
                .as_ref()
                .map_or(true, |key| key.expose().trim().is_empty())
        {
            return Err(SourceError::AuthRequired(
                "extended search needs an API key".to_string(),
            ));
        }

        // The rng is not Send, draw everything before awaiting
        let (delay, fails, postings) = {
            let mut rng = rand::thread_rng();
            let delay = rng.gen_range(self.latency_ms.0..=self.latency_ms.1);
            let fails = rng.gen_range(0..100) < self.failure_rate;
            (delay, fails, self.generate(request, &mut rng))
        };

        info!("Simulating {} for {} ms", self.source, delay);
        tokio::select! {
            _ = request.cancel.cancelled() => {
                return Err(SourceError::Unavailable("fetch cancelled".to_string()));
            }
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        }

        if fails {
            return Err(SourceError::Unavailable(format!(
                "simulated outage on {}",
                self.source
            )));
        }
        Ok(Box::pin(stream::iter(postings.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::engine::search::{Credential, SearchFilters};

    fn request(max_pages: u32) -> FetchRequest {
        let mut filters = SearchFilters::new(JobCategory::SoftwareEngineering, vec![JobSource::Indeed]);
        filters.max_pages_per_source = max_pages;
        FetchRequest::from_filters(&filters, Instant::now(), CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn generates_a_page_worth_per_requested_page() {
        let adapter = SimulatedAdapter::new(JobSource::Indeed)
            .with_latency(10, 20)
            .with_failure_rate(0);
        let postings: Vec<_> = adapter.fetch(&request(2)).await.unwrap().collect().await;
        assert_eq!(postings.len(), 2 * POSTINGS_PER_PAGE);
        assert!(postings.iter().all(|p| p.is_ok()));
    }

    #[tokio::test(start_paused = true)]
    async fn extended_search_requires_a_key() {
        let adapter = SimulatedAdapter::new(JobSource::GoogleDorks)
            .with_latency(1, 1)
            .with_failure_rate(0);
        let mut request = request(1);
        assert!(matches!(
            adapter.fetch(&request).await,
            Err(SourceError::AuthRequired(_))
        ));

        request.credential = Some(Credential::new("key-123"));
        assert!(adapter.fetch(&request).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_adapter_reports_unavailable() {
        let adapter = SimulatedAdapter::new(JobSource::Indeed)
            .with_latency(1, 1)
            .with_failure_rate(100);
        assert!(matches!(
            adapter.fetch(&request(1)).await,
            Err(SourceError::Unavailable(_))
        ));
    }
}
