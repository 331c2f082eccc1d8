//! Error types for filesystem bindings.

use thiserror::Error;

/// Result type alias for filesystem operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error variants for filesystem operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path does not exist as a file or directory.
    #[error("Path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: String,
    },

    /// The store rejected the connection (authentication, network, bad bucket).
    #[error("Connection to {uri} failed: {reason}")]
    Connection {
        /// The URI being connected to.
        uri: String,
        /// Description of the failure.
        reason: String,
    },

    /// The URI could not be parsed or names an unsupported scheme.
    #[error("Invalid URI {uri}: {reason}")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Description of the problem.
        reason: String,
    },

    /// A binding option has a value that cannot be used.
    #[error("Invalid value {value:?} for option {key}")]
    InvalidOption {
        /// The option key.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A non-recursive delete was asked to remove a directory with children.
    #[error("Directory not empty: {path}")]
    DirectoryNotEmpty {
        /// The directory path.
        path: String,
    },

    /// A seek past the end of the object.
    #[error("Seek to {offset} is beyond end of {path} ({length} bytes)")]
    InvalidSeek {
        /// The object being read.
        path: String,
        /// The requested offset.
        offset: u64,
        /// The object length.
        length: u64,
    },

    /// A positioned read ran past the end of the object.
    #[error("Unexpected end of {path}: wanted {wanted} bytes at offset {offset}")]
    UnexpectedEof {
        /// The object being read.
        path: String,
        /// The requested offset.
        offset: u64,
        /// The number of bytes requested.
        wanted: usize,
    },

    /// The stream was used after `close`.
    #[error("Stream for {path} is closed")]
    Closed {
        /// The object the stream was opened on.
        path: String,
    },

    /// The binding was revoked by its owner.
    #[error("Binding to {uri} has been revoked")]
    Revoked {
        /// URI of the revoked binding.
        uri: String,
    },

    /// Any other error reported by the object store driver.
    #[error("Object store error: {0}")]
    Backend(#[source] object_store::Error),

    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The I/O runtime could not be started or a request task was lost.
    #[error("I/O runtime error: {0}")]
    Runtime(String),
}

impl StoreError {
    /// True for the "path does not exist" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StoreError::NotFound { path },
            other => StoreError::Backend(other),
        }
    }
}
