//! Batch enrichment of village records from external source files

pub mod orchestrator;
pub mod sources;
pub mod statistics;

pub use orchestrator::EnrichmentPipeline;
pub use sources::{load_source, SourceRow};
pub use statistics::EnrichmentStats;
