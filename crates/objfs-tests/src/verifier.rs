//! Distributed write/read round trips through the compute engine.

use objfs_engine::{ComputeEngine, FsOverride, PartitionedDataset, COMPLETION_MARKER};
use objfs_store::{FileStatus, FileSystemBinding, Path};
use tracing::info;

use crate::error::{HarnessError, HarnessResult};
use crate::timing::{LatencyRecorder, OperationTiming};

/// Timing label of the engine write.
pub const WRITE_LABEL: &str = "roundtrip-write";
/// Timing label of the output listing.
pub const LIST_LABEL: &str = "roundtrip-list";
/// Timing label of the engine read.
pub const READ_LABEL: &str = "roundtrip-read";

/// What a successful round trip observed.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    /// Qualified output directory.
    pub destination: String,
    /// Records handed to the engine.
    pub records_written: u64,
    /// Lines read back.
    pub records_read: u64,
    /// Data files found in the output.
    pub data_files: Vec<FileStatus>,
    /// Write, list and read timings of this round trip.
    pub timings: Vec<OperationTiming>,
}

/// Writes `1..=N` through the engine and checks what lands in the store.
pub struct RoundTripVerifier<'a> {
    engine: &'a dyn ComputeEngine,
    recorder: &'a LatencyRecorder,
    partitions: usize,
    expected_data_files: usize,
}

impl<'a> RoundTripVerifier<'a> {
    /// Single-partition writes expecting a single data file.
    pub fn new(engine: &'a dyn ComputeEngine, recorder: &'a LatencyRecorder) -> Self {
        Self {
            engine,
            recorder,
            partitions: 1,
            expected_data_files: 1,
        }
    }

    /// Partitions of the generated dataset.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Data files the output must contain.
    pub fn with_expected_data_files(mut self, expected: usize) -> Self {
        self.expected_data_files = expected;
        self
    }

    /// Write `record_count` records to `destination` through `write`, then count them back
    /// through `read`.
    pub fn write_and_read_back(
        &self,
        record_count: u64,
        write: &FileSystemBinding,
        read: &FileSystemBinding,
        destination: &Path,
    ) -> HarnessResult<VerificationReport> {
        let mark = self.recorder.len();
        let qualified = write.qualify(destination);
        let dataset = PartitionedDataset::sequence(record_count, self.partitions);

        let write_fs = FsOverride::from_binding(write);
        self.recorder.time(WRITE_LABEL, || {
            self.engine
                .submit_partitioned_write(&dataset, destination, Some(&write_fs))
        })?;

        let listing = self
            .recorder
            .time(LIST_LABEL, || write.fs().list_status(destination));
        let listing = match listing {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let data_files = check_layout(&qualified, &listing, self.expected_data_files)?;

        let read_fs = FsOverride::from_binding(read);
        let records_read = self.recorder.time(READ_LABEL, || {
            data_files.iter().try_fold(0u64, |total, file| {
                Ok::<_, HarnessError>(total + self.engine.submit_count(&file.path, Some(&read_fs))?)
            })
        })?;

        if records_read != record_count {
            return Err(HarnessError::CountMismatch {
                expected: record_count,
                actual: records_read,
            });
        }
        info!(destination = %qualified, records = records_read, "round trip verified");
        Ok(VerificationReport {
            destination: qualified,
            records_written: record_count,
            records_read,
            data_files,
            timings: self.recorder.since(mark),
        })
    }
}

/// Check a job output listing and return its data files.
///
/// The listing must be non-empty and hold no subdirectories; every zero-length entry
/// must be the completion marker; exactly `expected_data_files` other entries.
pub fn check_layout(
    path: &str,
    listing: &[FileStatus],
    expected_data_files: usize,
) -> HarnessResult<Vec<FileStatus>> {
    let violation = |detail: String| HarnessError::UnexpectedLayout {
        path: path.to_string(),
        detail,
        listing: listing
            .iter()
            .map(|s| format!("{}({})", s.name(), s.length))
            .collect(),
    };

    if listing.is_empty() {
        return Err(violation("output directory is empty".to_string()));
    }
    if let Some(dir) = listing.iter().find(|s| s.is_directory) {
        return Err(violation(format!("unexpected subdirectory {}", dir.name())));
    }
    if let Some(empty) = listing
        .iter()
        .find(|s| s.length == 0 && s.name() != COMPLETION_MARKER)
    {
        return Err(violation(format!("zero-length file {}", empty.name())));
    }

    let data: Vec<FileStatus> = listing
        .iter()
        .filter(|s| s.name() != COMPLETION_MARKER)
        .cloned()
        .collect();
    if data.len() != expected_data_files {
        return Err(violation(format!(
            "expected {} data file(s), found {}",
            expected_data_files,
            data.len()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, length: u64) -> FileStatus {
        FileStatus::file(Path::from(format!("out/{name}")), length)
    }

    #[test]
    fn test_layout_single_file_with_marker() {
        let listing = vec![file("_SUCCESS", 0), file("part-00000", 3893)];
        let data = check_layout("out", &listing, 1).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name(), "part-00000");
    }

    #[test]
    fn test_layout_marker_optional() {
        let listing = vec![file("part-00000", 10)];
        assert!(check_layout("out", &listing, 1).is_ok());
    }

    #[test]
    fn test_layout_empty_listing() {
        let err = check_layout("out", &[], 1).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_layout_two_data_files() {
        let listing = vec![
            file("_SUCCESS", 0),
            file("part-00000", 4),
            file("part-00001", 4),
        ];
        let err = check_layout("out", &listing, 1).unwrap_err();
        match err {
            HarnessError::UnexpectedLayout { listing, detail, .. } => {
                assert_eq!(listing.len(), 3);
                assert!(detail.contains("found 2"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_layout_zero_length_data_file() {
        let listing = vec![file("_SUCCESS", 0), file("part-00000", 0)];
        let err = check_layout("out", &listing, 1).unwrap_err();
        assert!(err.to_string().contains("zero-length file part-00000"));
    }

    #[test]
    fn test_layout_subdirectory() {
        let listing = vec![
            file("part-00000", 4),
            FileStatus::directory(Path::from("out/_temporary")),
        ];
        let err = check_layout("out", &listing, 1).unwrap_err();
        assert!(err.to_string().contains("_temporary"));
    }
}
