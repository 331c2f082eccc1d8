#![warn(missing_docs)]

//! objfs compute engine: partitioned jobs over filesystem bindings
//!
//! A [`ComputeEngine`] accepts partitioned datasets and writes them as one text file per
//! partition plus a `_SUCCESS` marker, and reads or counts such outputs back. Each job may
//! carry an [`FsOverride`] naming the store it runs against; without one the engine's
//! ambient default filesystem is used. [`LocalEngine`] runs partition tasks on an owned
//! tokio worker pool.

pub mod dataset;
pub mod engine;
pub mod error;
pub mod local;

pub use dataset::{
    encode_lines, is_hidden_name, part_file_name, PartitionedDataset, COMPLETION_MARKER,
};
pub use engine::{ComputeEngine, FsOverride, WriteSummary};
pub use error::{EngineError, EngineResult};
pub use local::{EngineConfig, LocalEngine};
