//! Error types for time-series store operations

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to the time-series store
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store command could not be started at all
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The store command terminated with a non-zero exit code
    #[error("{command} terminated with non-zero exit code {code:?}: {output}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// The store answered with output we could not understand
    #[error("invalid store output: {0}")]
    InvalidOutput(String),

    /// Series file does not exist
    #[error("series {0} does not exist")]
    SeriesNotFound(PathBuf),

    /// Series file already exists and must not be overwritten
    #[error("series {0} already exists")]
    SeriesExists(PathBuf),

    /// I/O error (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
