//! Partitioned datasets and their text layout.

use bytes::Bytes;

/// Name of the zero-length object written after every partition of a job landed.
pub const COMPLETION_MARKER: &str = "_SUCCESS";

/// File name of partition `index` in a job's output directory.
pub fn part_file_name(index: usize) -> String {
    format!("part-{index:05}")
}

/// Hidden entries (`_SUCCESS`, `.dir_marker`, ...) that readers skip.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

/// An ordered sequence of text records split into partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedDataset {
    partitions: Vec<Vec<String>>,
}

impl PartitionedDataset {
    /// Slice `records` into `num_partitions` contiguous ranges of near-equal size.
    ///
    /// Partition `i` receives records `[i*n/p, (i+1)*n/p)`, so order is preserved when
    /// partitions are concatenated. Some partitions are empty when `n < p`.
    pub fn from_records<I>(records: I, num_partitions: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let records: Vec<String> = records.into_iter().collect();
        let num_partitions = num_partitions.max(1);
        let total = records.len();
        let mut iter = records.into_iter();
        let partitions = (0..num_partitions)
            .map(|i| {
                let start = i * total / num_partitions;
                let end = (i + 1) * total / num_partitions;
                iter.by_ref().take(end - start).collect()
            })
            .collect();
        Self { partitions }
    }

    /// Integers `1..=count` as decimal text.
    pub fn sequence(count: u64, num_partitions: usize) -> Self {
        Self::from_records((1..=count).map(|i| i.to_string()), num_partitions)
    }

    /// All partitions in order.
    pub fn partitions(&self) -> &[Vec<String>] {
        &self.partitions
    }

    /// Number of partitions, empty ones included.
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Total number of records.
    pub fn record_count(&self) -> u64 {
        self.partitions.iter().map(|p| p.len() as u64).sum()
    }
}

/// Newline-terminated text encoding of one partition.
pub fn encode_lines(records: &[String]) -> Bytes {
    let size = records.iter().map(|r| r.len() + 1).sum();
    let mut body = Vec::with_capacity(size);
    for record in records {
        body.extend_from_slice(record.as_bytes());
        body.push(b'\n');
    }
    Bytes::from(body)
}
