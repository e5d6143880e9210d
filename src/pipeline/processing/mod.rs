// Pipeline processing: decoding, flattening, anonymization and merging

pub mod annotations;
pub mod anonymize;
pub mod decode;
pub mod flatten;
pub mod locations;
pub mod merge;

// Re-export key types and functions
pub use annotations::extract_task_values;
pub use anonymize::Anonymizer;
pub use decode::{decode_column, DecodedColumn, Shape};
pub use flatten::{flatten_object, flatten_rows, render_cell};
pub use locations::collapse_locations;
pub use merge::{combine_aligned, left_join, JoinReport};
