//! Latency profiles of stream operations: the seek/read sequence and close cost.

use std::time::Duration;

use objfs_store::{FileSystem, Path};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::timing::{LatencyRecorder, OperationTiming};

/// Labels of the seek/read profile, in execution order.
pub const PROFILE_LABELS: [&str; 9] = [
    "stat",
    "open",
    "read",
    "seek-near-end",
    "read-after-seek",
    "read-fully-random",
    "seek-near-start",
    "read-near-start",
    "close",
];

/// Bytes read by each profile read.
pub const DEFAULT_READ_SIZE: usize = 8 * 1024;

/// Seed of the random positioned read unless overridden.
pub const DEFAULT_PROFILE_SEED: u64 = 0x0b1f5;

/// Times the fixed seek/read sequence on one object.
pub struct SeekReadProfile<'a> {
    recorder: &'a LatencyRecorder,
    read_size: usize,
    seed: u64,
}

impl<'a> SeekReadProfile<'a> {
    /// Profile with default read size and seed.
    pub fn new(recorder: &'a LatencyRecorder) -> Self {
        Self {
            recorder,
            read_size: DEFAULT_READ_SIZE,
            seed: DEFAULT_PROFILE_SEED,
        }
    }

    /// Bytes per read.
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    /// Seed of the random positioned read.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the sequence against `path` and return its timings in order.
    pub fn run(&self, fs: &dyn FileSystem, path: &Path) -> HarnessResult<Vec<OperationTiming>> {
        let mark = self.recorder.len();
        let [
            stat,
            open,
            read,
            seek_end,
            read_after_seek,
            read_random,
            seek_start,
            read_start,
            close,
        ] = PROFILE_LABELS;

        let status = self.recorder.time(stat, || fs.stat(path))?;
        if status.is_directory {
            return Err(HarnessError::Violation(format!("{path} is a directory, not an object")));
        }
        let length = status.length;
        let chunk = (self.read_size as u64).min(length) as usize;
        let mut buf = vec![0u8; chunk];

        let mut stream = self.recorder.time(open, || fs.open(path))?;
        self.recorder.time(read, || stream.read(&mut buf))?;

        let near_end = length - chunk as u64;
        self.recorder.time(seek_end, || stream.seek(near_end))?;
        self.recorder.time(read_after_seek, || stream.read(&mut buf))?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let random_offset = rng.gen_range(0..=length - chunk as u64);
        self.recorder
            .time(read_random, || stream.read_fully(random_offset, &mut buf))?;

        let near_start = (self.read_size as u64).min(length / 2);
        self.recorder.time(seek_start, || stream.seek(near_start))?;
        self.recorder.time(read_start, || stream.read(&mut buf))?;

        self.recorder.time(close, || stream.close())?;
        debug!(path = %path, length, random_offset, "seek/read profile complete");
        Ok(self.recorder.since(mark))
    }
}

/// Close timings observed at each offset.
#[derive(Debug, Clone)]
pub struct CloseCostReport {
    /// `(offset, close duration)` in the order measured.
    pub closes: Vec<(u64, Duration)>,
    /// Fastest close.
    pub fastest: Duration,
    /// Slowest close.
    pub slowest: Duration,
    /// Largest close accepted.
    pub limit: Duration,
}

/// Flags a close whose cost grows with the amount of unread stream.
///
/// Opens the object once per offset, seeks there, reads a byte, and times only the close.
pub struct CloseCostCheck<'a> {
    recorder: &'a LatencyRecorder,
    tolerance_factor: f64,
    slack: Duration,
}

impl<'a> CloseCostCheck<'a> {
    /// Check with tolerance `fastest * 4 + 50ms`.
    pub fn new(recorder: &'a LatencyRecorder) -> Self {
        Self {
            recorder,
            tolerance_factor: 4.0,
            slack: Duration::from_millis(50),
        }
    }

    /// Override the tolerance.
    pub fn with_tolerance(mut self, factor: f64, slack: Duration) -> Self {
        self.tolerance_factor = factor;
        self.slack = slack;
        self
    }

    /// Start, middle and last byte of an object of `length` bytes.
    pub fn offsets(length: u64) -> Vec<u64> {
        let mut offsets = vec![0, length / 2, length.saturating_sub(1)];
        offsets.dedup();
        offsets
    }

    /// Measure close at every offset of `path` and evaluate.
    pub fn run(&self, fs: &dyn FileSystem, path: &Path) -> HarnessResult<CloseCostReport> {
        let length = fs.stat(path)?.length;
        let mut closes = Vec::new();
        for offset in Self::offsets(length) {
            let mut stream = fs.open(path)?;
            stream.seek(offset)?;
            if offset < length {
                let mut byte = [0u8; 1];
                stream.read(&mut byte)?;
            }
            let label = format!("close@{offset}");
            self.recorder.time(&label, || stream.close())?;
            if let Some(timing) = self.recorder.last(&label) {
                closes.push((offset, timing.elapsed));
            }
        }
        self.evaluate(closes)
    }

    /// Apply the tolerance to measured closes.
    pub fn evaluate(&self, closes: Vec<(u64, Duration)>) -> HarnessResult<CloseCostReport> {
        let (Some(fastest), Some(slowest)) = (
            closes.iter().map(|(_, d)| *d).min(),
            closes.iter().map(|(_, d)| *d).max(),
        ) else {
            return Err(HarnessError::Violation("no close was measured".to_string()));
        };
        let limit = fastest.mul_f64(self.tolerance_factor) + self.slack;
        if slowest > limit {
            warn!(?closes, "close latency grows with offset");
            return Err(HarnessError::LatencyRegression {
                fastest_ms: fastest.as_secs_f64() * 1000.0,
                slowest_ms: slowest.as_secs_f64() * 1000.0,
                limit_ms: limit.as_secs_f64() * 1000.0,
            });
        }
        Ok(CloseCostReport {
            closes,
            fastest,
            slowest,
            limit,
        })
    }
}
