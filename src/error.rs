//! Centralized error types for mailtrail.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailtrail library.
#[derive(Error, Debug)]
pub enum TrailError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A header line without a colon, rejected in strict parsing mode.
    #[error("Malformed header in '{source_id}' at line {line}: {content:?}")]
    MalformedHeader {
        source_id: String,
        line: usize,
        content: String,
    },

    /// The persisted document store is corrupt or incompatible.
    #[error("Corrupt or incompatible document store '{path}': {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// The embedding service failed or returned an unusable response.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The text-generation service failed or returned an unusable response.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// An embedding did not have the dimension the store was built with.
    #[error("Embedding dimension mismatch: store expects {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The session does not hold enough credits for the request.
    #[error("Not enough credits: {needed} needed, {available} available")]
    InsufficientCredits { needed: u32, available: u32 },

    /// An evaluation test-case file could not be understood.
    #[error("Invalid test cases in '{path}': {reason}")]
    InvalidCases { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, TrailError>`.
pub type Result<T> = std::result::Result<T, TrailError>;

impl TrailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    ///
    /// `NotFound` is reported as [`TrailError::FileNotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare; prefer `TrailError::io`).
impl From<std::io::Error> for TrailError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
