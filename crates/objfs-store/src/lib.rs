#![warn(missing_docs)]

//! objfs storage bindings: blocking filesystem semantics over object stores
//!
//! This crate turns a storage URI (`s3://`, `abfs://`, `gs://`, `file://`, `memory://`)
//! plus connection options into a [`FileSystemBinding`]: a handle exposing directory
//! creation and deletion, stat, listing, whole-object writes and seekable reads through
//! the blocking [`FileSystem`] trait. The drivers themselves come from `object_store`.

pub mod binding;
pub mod error;
pub mod fs;
pub mod memory;
pub mod object_fs;
pub mod revocable;
mod runtime;

pub use binding::{credential_options, join_path, resolve, FileSystemBinding, READAHEAD_OPTION};
pub use error::{StoreError, StoreResult};
pub use fs::{FileStatus, FileSystem, InputStream, StreamReader, DIR_MARKER};
pub use memory::shared_memory_store;
pub use object_fs::{ObjectInputStream, ObjectStoreFileSystem, DEFAULT_READAHEAD};
pub use revocable::Revoker;

pub use object_store::path::Path;
