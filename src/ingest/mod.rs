pub mod normalizer;
pub mod worker;

pub use normalizer::normalize;
pub use worker::{collect_locks, IngestFailure, IngestSummary, IngestedState, Ingestor, WorkItem};
