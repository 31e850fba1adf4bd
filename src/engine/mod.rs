pub mod classifier;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod filters;
pub mod job;
pub mod progress;
pub mod search;
pub mod source;
pub mod stats;
pub mod terms;

pub use classifier::Classifier;
pub use coordinator::{SearchCoordinator, SearchSettings};
pub use error::{CoordinatorError, SearchError, SourceError, SourceErrorKind, SourceFailure};
pub use job::{
    ExperienceFilter, ExperienceLevel, Job, JobCategory, JobSource, RawPosting, SourcePriority,
    TimeFilter,
};
pub use progress::{ProgressTracker, ScrapingProgress};
pub use search::{Credential, SearchFilters, SearchId, SearchPhase, SearchResult, SearchStatus};
pub use source::{AdapterRegistry, FetchRequest, PostingStream, SourceAdapter};
pub use stats::JobStats;
pub use terms::TermSets;
