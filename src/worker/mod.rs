pub mod eviction_worker;
pub mod search_worker;

pub use eviction_worker::EvictionWorker;
pub use search_worker::SearchWorker;
