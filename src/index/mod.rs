//! Turning parsed records into stored, embedded documents.

pub mod pipeline;

pub use pipeline::{index_paths, index_records, IndexOptions, IndexingError, IndexingResult};
