// Export pipeline: ingestion, processing, and output

pub mod export;
pub mod ingestion;
pub mod orchestrator;
pub mod processing;

// Re-export key types from each stage
pub use orchestrator::{Pipeline, PipelineResult, TransformOptions, TransformOutcome, TransformStats};
