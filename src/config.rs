use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::engine::coordinator::SearchSettings;
use crate::engine::job::{JobSource, SourcePriority};

/// Command line overrides for the environment configuration
#[derive(Debug, Default, Parser)]
#[command(name = "job-aggregator", about = "Multi-source job search aggregator")]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Directory for the rolling log files
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Directory with `{source}.json` posting fixtures
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// JSON file replacing the built-in classifier term sets
    #[arg(long)]
    pub terms: Option<PathBuf>,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 1MB
    pub max_payload_size: usize,

    pub max_concurrent_searches: usize,
    pub search_queue_capacity: usize,
    pub source_timeout: Duration,
    pub search_timeout: Duration,
    pub result_retention: Duration,
    pub eviction_interval: Duration,
    pub min_pages: u32,
    pub max_pages: u32,
    pub max_progress_wait: Duration,
    pub source_priority: SourcePriority,

    /// Optional replacement for the built-in classifier terms
    pub classifier_terms_path: Option<PathBuf>,
    pub fixtures_dir: Option<PathBuf>,
    /// Sources served by the simulated adapter
    pub simulated_sources: Vec<JobSource>,

    pub log_dir: String,
}

/// Reads `key` and parses it, falling back to `default` when unset.
/// A value that is set but does not parse is an error.
fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(default),
    }
}

fn parse_secs(key: &str, default: u64) -> Result<Duration, String> {
    parse_var(key, default).map(Duration::from_secs)
}

fn optional_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn parse_sources(raw: &str) -> Result<Vec<JobSource>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(JobSource::from_str)
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Every variable is optional:
    /// - BIND_ADDRESS / PORT: listen address (default: 127.0.0.1:8080)
    /// - MAX_PAYLOAD_SIZE: request payload limit in bytes (default: 1048576)
    /// - MAX_CONCURRENT_SEARCHES / SEARCH_QUEUE_CAPACITY: dispatcher limits (4 / 32)
    /// - SOURCE_TIMEOUT_SECS / SEARCH_TIMEOUT_SECS: deadlines (45 / 180)
    /// - RESULT_RETENTION_SECS / EVICTION_INTERVAL_SECS: result lifetime (3600 / 60)
    /// - MIN_PAGES / MAX_PAGES: page budget clamp (1 / 10)
    /// - MAX_PROGRESS_WAIT_SECS: long-poll cap (30)
    /// - SOURCE_PRIORITY: comma separated sources, highest first
    /// - CLASSIFIER_TERMS_PATH, FIXTURES_DIR, SIMULATED_SOURCES, LOG_DIR
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let min_pages = parse_var("MIN_PAGES", 1u32)?;
        let max_pages = parse_var("MAX_PAGES", 10u32)?;
        if min_pages == 0 || min_pages > max_pages {
            return Err(format!(
                "MIN_PAGES ({}) must be at least 1 and not above MAX_PAGES ({})",
                min_pages, max_pages
            ));
        }

        let max_concurrent_searches = parse_var("MAX_CONCURRENT_SEARCHES", 4usize)?;
        if max_concurrent_searches == 0 {
            return Err("MAX_CONCURRENT_SEARCHES must be at least 1".to_string());
        }

        Ok(Config {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080u16)?,
            max_payload_size: parse_var("MAX_PAYLOAD_SIZE", 1024 * 1024usize)?,
            max_concurrent_searches,
            search_queue_capacity: parse_var("SEARCH_QUEUE_CAPACITY", 32usize)?.max(1),
            source_timeout: parse_secs("SOURCE_TIMEOUT_SECS", 45)?,
            search_timeout: parse_secs("SEARCH_TIMEOUT_SECS", 180)?,
            result_retention: parse_secs("RESULT_RETENTION_SECS", 3600)?,
            eviction_interval: parse_secs("EVICTION_INTERVAL_SECS", 60)?.max(Duration::from_secs(1)),
            min_pages,
            max_pages,
            max_progress_wait: parse_secs("MAX_PROGRESS_WAIT_SECS", 30)?,
            source_priority: parse_var("SOURCE_PRIORITY", SourcePriority::default())?,
            classifier_terms_path: optional_path("CLASSIFIER_TERMS_PATH"),
            fixtures_dir: optional_path("FIXTURES_DIR"),
            simulated_sources: parse_sources(&env::var("SIMULATED_SOURCES").unwrap_or_default())?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }

    /// Applies command line overrides on top of the environment.
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.bind_address = bind;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(log_dir) = cli.log_dir {
            self.log_dir = log_dir;
        }
        if cli.fixtures.is_some() {
            self.fixtures_dir = cli.fixtures;
        }
        if cli.terms.is_some() {
            self.classifier_terms_path = cli.terms;
        }
        self
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            max_concurrent_searches: self.max_concurrent_searches,
            queue_capacity: self.search_queue_capacity,
            source_timeout: self.source_timeout,
            search_timeout: self.search_timeout,
            min_pages: self.min_pages,
            max_pages: self.max_pages,
            retention: self.result_retention,
            max_progress_wait: self.max_progress_wait,
            source_priority: self.source_priority.clone(),
        }
    }
}
