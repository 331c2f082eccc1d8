//! The compute-engine interface the harness drives.

use std::collections::BTreeMap;
use std::fmt;

use objfs_store::{resolve, FileStatus, FileSystemBinding, Path, StoreResult};
use url::Url;

use crate::dataset::PartitionedDataset;
use crate::error::EngineResult;

/// Filesystem configuration for a single job.
///
/// Built fresh for each submission and passed by value into the job; the engine's own
/// default filesystem is never mutated.
#[derive(Clone)]
pub struct FsOverride {
    default_fs: Url,
    options: BTreeMap<String, String>,
}

impl FsOverride {
    /// Use `default_fs` with no extra options.
    pub fn new(default_fs: Url) -> Self {
        Self {
            default_fs,
            options: BTreeMap::new(),
        }
    }

    /// Target the store `binding` is bound to, with the same options.
    pub fn from_binding(binding: &FileSystemBinding) -> Self {
        Self {
            default_fs: binding.root().clone(),
            options: binding.options().clone(),
        }
    }

    /// Add or replace one option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// The default filesystem URI for the job.
    pub fn default_fs(&self) -> &Url {
        &self.default_fs
    }

    /// Connection options for the job.
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Resolve the binding the job will use.
    pub fn resolve(&self) -> StoreResult<FileSystemBinding> {
        resolve(self.default_fs.as_str(), &self.options)
    }
}

impl fmt::Debug for FsOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsOverride")
            .field("default_fs", &self.default_fs.as_str())
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a completed partitioned write produced.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// One entry per non-empty partition, in partition order.
    pub files: Vec<FileStatus>,
    /// Records written across all partitions.
    pub records: u64,
}

/// A distributed engine as seen by the harness: blocking job submission.
///
/// `fs = None` runs the job against the engine's ambient default filesystem.
pub trait ComputeEngine: Send + Sync {
    /// Partition count the engine uses for new datasets.
    fn default_parallelism(&self) -> usize;

    /// Write `dataset` as text under `destination`: one file per non-empty partition,
    /// then a zero-length completion marker. Blocks until the job finishes.
    fn submit_partitioned_write(
        &self,
        dataset: &PartitionedDataset,
        destination: &Path,
        fs: Option<&FsOverride>,
    ) -> EngineResult<WriteSummary>;

    /// Read every line under `path` (a file, or a job output directory).
    fn submit_read(&self, path: &Path, fs: Option<&FsOverride>) -> EngineResult<Vec<String>>;

    /// Count the lines under `path`.
    fn submit_count(&self, path: &Path, fs: Option<&FsOverride>) -> EngineResult<u64> {
        Ok(self.submit_read(path, fs)?.len() as u64)
    }
}
