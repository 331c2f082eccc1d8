//! Error types for the harness.

use objfs_engine::EngineError;
use objfs_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Everything that can fail a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Authentication or network failure reaching the target store, reported verbatim.
    #[error("Cannot connect to {uri}: {reason}")]
    Connection {
        /// The target URI.
        uri: String,
        /// The driver's own message.
        reason: String,
    },

    /// A path expected to exist does not.
    #[error("Not found: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// A job output directory does not look like a single-partition write.
    #[error("Unexpected layout under {path}: {detail}; listing: [{}]", listing.join(", "))]
    UnexpectedLayout {
        /// The output directory.
        path: String,
        /// What was wrong.
        detail: String,
        /// `name(length)` of every entry found.
        listing: Vec<String>,
    },

    /// Rows read back differ from rows written.
    #[error("Count mismatch: expected {expected}, read back {actual}")]
    CountMismatch {
        /// Rows written.
        expected: u64,
        /// Rows read.
        actual: u64,
    },

    /// The compute engine rejected or failed a job.
    #[error("Execution failed: {0}")]
    Execution(#[from] EngineError),

    /// Remote tests are not enabled by configuration.
    #[error("Remote tests disabled: {reason}")]
    Disabled {
        /// Why the gate is closed.
        reason: String,
    },

    /// A freshly generated test directory was already present.
    #[error("Test directory already exists: {path}")]
    DirectoryCollision {
        /// The colliding path.
        path: String,
    },

    /// The test directory is still visible after release.
    #[error("Test directory survived teardown: {path}: {detail}")]
    TeardownDefect {
        /// The test directory.
        path: String,
        /// What `stat` reported instead of NotFound.
        detail: String,
    },

    /// A binding was used after its session released it.
    #[error("Binding used after release: {uri}")]
    BindingReleased {
        /// URI of the released binding.
        uri: String,
    },

    /// Close latency grows with the stream offset.
    #[error(
        "Close latency regression: slowest {slowest_ms:.2}ms exceeds limit {limit_ms:.2}ms (fastest {fastest_ms:.2}ms)"
    )]
    LatencyRegression {
        /// Fastest close.
        fastest_ms: f64,
        /// Slowest close.
        slowest_ms: f64,
        /// Largest acceptable close.
        limit_ms: f64,
    },

    /// A scenario assertion did not hold.
    #[error("Check failed: {0}")]
    Violation(String),

    /// Filesystem operation failure.
    #[error("Storage error: {0}")]
    Store(#[source] StoreError),

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<StoreError> for HarnessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Revoked { uri } => HarnessError::BindingReleased { uri },
            other => HarnessError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_message_includes_listing() {
        let err = HarnessError::UnexpectedLayout {
            path: "memory://t/out".to_string(),
            detail: "expected 1 data file, found 2".to_string(),
            listing: vec!["part-00000(4)".to_string(), "part-00001(4)".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("part-00000(4), part-00001(4)"));
        assert!(msg.contains("found 2"));
    }

    #[test]
    fn test_engine_error_is_execution() {
        let err: HarnessError = EngineError::Runtime("pool gone".to_string()).into();
        assert!(matches!(err, HarnessError::Execution(_)));
    }

    #[test]
    fn test_store_error_converts() {
        let err: HarnessError = StoreError::NotFound {
            path: "x".to_string(),
        }
        .into();
        assert!(matches!(err, HarnessError::Store(_)));
    }

    #[test]
    fn test_revoked_store_error_is_binding_released() {
        let err: HarnessError = StoreError::Revoked {
            uri: "memory://t/".to_string(),
        }
        .into();
        assert!(matches!(err, HarnessError::BindingReleased { uri } if uri == "memory://t/"));
    }

    #[test]
    fn test_regression_message() {
        let err = HarnessError::LatencyRegression {
            fastest_ms: 1.0,
            slowest_ms: 120.5,
            limit_ms: 54.0,
        };
        assert!(err.to_string().contains("120.50ms"));
    }
}
