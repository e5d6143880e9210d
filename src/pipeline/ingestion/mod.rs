// Pipeline ingestion: locating inputs and reading them into frames

pub mod loader;
pub mod source;

// Re-export key types and functions for external use
pub use loader::{read_frame, TableSpec};
pub use source::Source;
