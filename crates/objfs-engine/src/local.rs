//! In-process engine: one blocking task per partition on a tokio worker pool.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use objfs_store::{
    resolve, FileStatus, FileSystem, FileSystemBinding, Path, StoreResult, StreamReader,
};
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::dataset::{
    encode_lines, is_hidden_name, part_file_name, PartitionedDataset, COMPLETION_MARKER,
};
use crate::engine::{ComputeEngine, FsOverride, WriteSummary};
use crate::error::{EngineError, EngineResult};

/// Ambient configuration of a [`LocalEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Filesystem used when a job carries no override.
    pub default_fs: String,
    /// Options for `default_fs`.
    pub default_options: BTreeMap<String, String>,
    /// Concurrent partition tasks.
    pub worker_threads: usize,
    /// Partitions per new dataset.
    pub partitions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_fs: "memory://objfs-engine/".to_string(),
            default_options: BTreeMap::new(),
            worker_threads: 4,
            partitions: 1,
        }
    }
}

impl EngineConfig {
    /// Set the partition count for new datasets.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Set the number of concurrent tasks.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    /// Set the ambient default filesystem.
    pub fn with_default_fs(mut self, default_fs: impl Into<String>) -> Self {
        self.default_fs = default_fs.into();
        self
    }
}

/// A [`ComputeEngine`] running partition tasks on an owned tokio runtime.
///
/// Calls block the submitting thread until the job completes; they must not be made
/// from inside an async context.
pub struct LocalEngine {
    config: EngineConfig,
    runtime: Runtime,
}

type LineReader = Box<dyn BufRead + Send>;

impl LocalEngine {
    /// Start the worker pool.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let workers = config.worker_threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("objfs-engine")
            .enable_all()
            .build()
            .map_err(|e| EngineError::Runtime(format!("failed to start worker pool: {e}")))?;
        Ok(Self { config, runtime })
    }

    /// The engine's ambient configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn binding_for(&self, fs: Option<&FsOverride>) -> EngineResult<FileSystemBinding> {
        let binding = match fs {
            Some(job_fs) => job_fs.resolve()?,
            None => resolve(&self.config.default_fs, &self.config.default_options)?,
        };
        Ok(binding)
    }

    fn input_files(binding: &FileSystemBinding, path: &Path) -> EngineResult<Vec<FileStatus>> {
        let status = binding.fs().stat(path)?;
        if !status.is_directory {
            return Ok(vec![status]);
        }
        Ok(binding
            .fs()
            .list_status(path)?
            .into_iter()
            .filter(|entry| !entry.is_directory && !is_hidden_name(entry.name()))
            .collect())
    }

    /// Run `scan` over every input file under `path`, one task per file, results in file order.
    fn scan<T>(
        &self,
        path: &Path,
        fs: Option<&FsOverride>,
        scan: fn(LineReader) -> io::Result<T>,
    ) -> EngineResult<Vec<T>>
    where
        T: Send + 'static,
    {
        let binding = self.binding_for(fs)?;
        let inputs = Self::input_files(&binding, path)?;
        info!(path = %binding.qualify(path), files = inputs.len(), "submitting read");

        let filesystem = binding.filesystem();
        let mut results = self.runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for (index, input) in inputs.into_iter().enumerate() {
                let fs = Arc::clone(&filesystem);
                tasks.spawn_blocking(move || {
                    let reader = open_lines(fs.as_ref(), &input.path)
                        .map_err(|source| EngineError::TaskFailed { partition: index, source })?;
                    let value = scan(reader).map_err(|e| EngineError::Decode {
                        path: input.path.to_string(),
                        reason: e.to_string(),
                    })?;
                    Ok::<_, EngineError>((index, value))
                });
            }
            let mut scanned = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                let result = joined.map_err(|e| EngineError::Runtime(e.to_string()))?;
                scanned.push(result?);
            }
            Ok::<_, EngineError>(scanned)
        })?;
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }
}

impl ComputeEngine for LocalEngine {
    fn default_parallelism(&self) -> usize {
        self.config.partitions.max(1)
    }

    fn submit_partitioned_write(
        &self,
        dataset: &PartitionedDataset,
        destination: &Path,
        fs: Option<&FsOverride>,
    ) -> EngineResult<WriteSummary> {
        let binding = self.binding_for(fs)?;
        let filesystem = binding.filesystem();
        match filesystem.list_status(destination) {
            Ok(entries) if !entries.is_empty() => {
                return Err(EngineError::DestinationExists {
                    path: binding.qualify(destination),
                })
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let started = Instant::now();
        info!(
            destination = %binding.qualify(destination),
            partitions = dataset.num_partitions(),
            records = dataset.record_count(),
            "submitting partitioned write"
        );

        let mut written = self.runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for (index, records) in dataset.partitions().iter().enumerate() {
                if records.is_empty() {
                    continue;
                }
                let fs = Arc::clone(&filesystem);
                let path = destination.child(part_file_name(index));
                let records = records.clone();
                tasks.spawn_blocking(move || {
                    let body = encode_lines(&records);
                    let length = body.len() as u64;
                    fs.create(&path, body)
                        .map_err(|source| EngineError::TaskFailed { partition: index, source })?;
                    Ok::<_, EngineError>((index, FileStatus::file(path, length)))
                });
            }
            let mut files = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                let result = joined.map_err(|e| EngineError::Runtime(e.to_string()))?;
                files.push(result?);
            }
            Ok::<_, EngineError>(files)
        })?;
        written.sort_by_key(|(index, _)| *index);

        filesystem.create(&destination.child(COMPLETION_MARKER), Bytes::new())?;
        debug!(
            destination = %binding.qualify(destination),
            files = written.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "partitioned write committed"
        );

        Ok(WriteSummary {
            files: written.into_iter().map(|(_, status)| status).collect(),
            records: dataset.record_count(),
        })
    }

    fn submit_read(&self, path: &Path, fs: Option<&FsOverride>) -> EngineResult<Vec<String>> {
        let per_file = self.scan(path, fs, |reader| {
            reader.lines().collect::<io::Result<Vec<_>>>()
        })?;
        Ok(per_file.into_iter().flatten().collect())
    }

    fn submit_count(&self, path: &Path, fs: Option<&FsOverride>) -> EngineResult<u64> {
        let per_file = self.scan(path, fs, count_lines)?;
        Ok(per_file.into_iter().sum())
    }
}

/// Open `path` as a line reader, decompressing `.zst` objects.
fn open_lines(fs: &dyn FileSystem, path: &Path) -> StoreResult<LineReader> {
    let stream = fs.open(path)?;
    let reader = StreamReader::new(stream);
    if path.extension() == Some("zst") {
        let decoder = zstd::stream::read::Decoder::new(reader)?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(reader)))
    }
}

fn count_lines(mut reader: LineReader) -> io::Result<u64> {
    let mut count = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        count += 1;
    }
    Ok(count)
}
