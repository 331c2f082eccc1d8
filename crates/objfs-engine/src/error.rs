//! Error types for compute-engine jobs.

use objfs_store::StoreError;
use thiserror::Error;

/// Result type alias for engine jobs.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures of a submitted job. Callers treat these as opaque execution errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The write destination already holds data.
    #[error("Destination already exists: {path}")]
    DestinationExists {
        /// The destination path.
        path: String,
    },

    /// A partition task failed.
    #[error("Task for partition {partition} failed: {source}")]
    TaskFailed {
        /// Index of the failed partition.
        partition: usize,
        /// The storage failure behind it.
        #[source]
        source: StoreError,
    },

    /// Input could not be decoded as text lines.
    #[error("Cannot decode {path}: {reason}")]
    Decode {
        /// The file being decoded.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// Storage failure outside any single task (resolve, listing, marker write).
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The worker pool could not start or lost a task.
    #[error("Worker pool error: {0}")]
    Runtime(String),
}
