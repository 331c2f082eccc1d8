//! Wall-clock latency instrumentation for single operations.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One timed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationTiming {
    /// Operation label.
    pub label: String,
    /// Start, in milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    /// Measured duration.
    pub elapsed: Duration,
}

impl OperationTiming {
    /// Elapsed time in fractional milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Times operations and keeps every measurement in order.
///
/// A measurement is recorded when the operation finishes by any route, including an
/// error return or a panic; the operation's outcome is passed through untouched.
#[derive(Debug, Default)]
pub struct LatencyRecorder {
    timings: Mutex<Vec<OperationTiming>>,
}

impl LatencyRecorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op`, record how long it took under `label`, return its result.
    pub fn time<T, F>(&self, label: &str, op: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _guard = TimingGuard {
            recorder: self,
            label,
            started_at: SystemTime::now(),
            start: Instant::now(),
        };
        op()
    }

    /// Number of recorded timings. Use as a mark for [`LatencyRecorder::since`].
    pub fn len(&self) -> usize {
        self.timings.lock().len()
    }

    /// Whether nothing was timed yet.
    pub fn is_empty(&self) -> bool {
        self.timings.lock().is_empty()
    }

    /// All timings so far.
    pub fn timings(&self) -> Vec<OperationTiming> {
        self.timings.lock().clone()
    }

    /// Timings recorded after `mark`.
    pub fn since(&self, mark: usize) -> Vec<OperationTiming> {
        self.timings.lock().get(mark..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// The most recent timing with `label`.
    pub fn last(&self, label: &str) -> Option<OperationTiming> {
        self.timings
            .lock()
            .iter()
            .rev()
            .find(|t| t.label == label)
            .cloned()
    }

    fn record(&self, label: &str, started_at: SystemTime, elapsed: Duration) {
        let timing = OperationTiming {
            label: label.to_string(),
            started_at_ms: started_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            elapsed,
        };
        info!(
            label,
            elapsed_ms = timing.elapsed_ms(),
            unwinding = std::thread::panicking(),
            "operation timed"
        );
        self.timings.lock().push(timing);
    }
}

struct TimingGuard<'a> {
    recorder: &'a LatencyRecorder,
    label: &'a str,
    started_at: SystemTime,
    start: Instant,
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.recorder
            .record(self.label, self.started_at, self.start.elapsed());
    }
}
