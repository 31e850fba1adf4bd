//! Multi-source job search aggregator: fans a search out to job board
//! adapters, tracks progress, then deduplicates, classifies and summarizes
//! the combined postings.

pub mod api;
pub mod config;
pub mod engine;
pub mod shutdown;
pub mod sources;
pub mod worker;
