//! The blocking filesystem interface every binding exposes.
//!
//! Paths are object-store keys (`object_store::path::Path`) relative to the root of
//! the bound store. Directories are virtual: a directory exists while any object lives
//! under its prefix or while its directory marker object is present.

use std::io;

use bytes::Bytes;
use object_store::path::Path;

use crate::error::{StoreError, StoreResult};

/// Name of the zero-length object `mkdirs` writes so empty directories stay visible.
pub const DIR_MARKER: &str = ".dir_marker";

/// Result of `stat` and the entries of `list_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Full key of the entry.
    pub path: Path,
    /// Length in bytes; zero for directories.
    pub length: u64,
    /// True when the entry is a (virtual) directory.
    pub is_directory: bool,
}

impl FileStatus {
    /// Status of a regular object.
    pub fn file(path: Path, length: u64) -> Self {
        Self {
            path,
            length,
            is_directory: false,
        }
    }

    /// Status of a virtual directory.
    pub fn directory(path: Path) -> Self {
        Self {
            path,
            length: 0,
            is_directory: true,
        }
    }

    /// Last path segment, or the empty string for the store root.
    pub fn name(&self) -> &str {
        self.path.filename().unwrap_or("")
    }
}

/// A seekable read stream over one object.
pub trait InputStream: Send {
    /// The object being read.
    fn path(&self) -> &Path;
    /// Total object length in bytes.
    fn length(&self) -> u64;
    /// Current read position.
    fn pos(&self) -> u64;
    /// Read up to `buf.len()` bytes at the current position; `Ok(0)` at end of object.
    fn read(&mut self, buf: &mut [u8]) -> StoreResult<usize>;
    /// Fill `buf` from `offset` without moving the current position.
    fn read_fully(&mut self, offset: u64, buf: &mut [u8]) -> StoreResult<()>;
    /// Move the current position. Seeking to `length()` is allowed.
    fn seek(&mut self, offset: u64) -> StoreResult<()>;
    /// Release the stream. Idempotent; other calls fail afterwards.
    fn close(&mut self) -> StoreResult<()>;
}

/// Blocking filesystem operations over a bound store.
pub trait FileSystem: Send + Sync {
    /// Short backend description for logs, e.g. `memory://scratch`.
    fn describe(&self) -> String;
    /// Create a directory and all missing parents.
    fn mkdirs(&self, path: &Path) -> StoreResult<()>;
    /// Delete a file or directory. Returns false when nothing existed.
    fn delete(&self, path: &Path, recursive: bool) -> StoreResult<bool>;
    /// Status of a path; `StoreError::NotFound` when absent.
    fn stat(&self, path: &Path) -> StoreResult<FileStatus>;
    /// Direct children of a directory, sorted by path. A file lists as itself.
    fn list_status(&self, path: &Path) -> StoreResult<Vec<FileStatus>>;
    /// Write a whole object, replacing any previous content.
    fn create(&self, path: &Path, data: Bytes) -> StoreResult<()>;
    /// Open an object for reading.
    fn open(&self, path: &Path) -> StoreResult<Box<dyn InputStream>>;

    /// True when `stat` finds the path.
    fn exists(&self, path: &Path) -> StoreResult<bool> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Adapts an [`InputStream`] to `std::io::Read` so decoders can sit on top of it.
pub struct StreamReader {
    inner: Box<dyn InputStream>,
}

impl StreamReader {
    /// Wrap an open stream.
    pub fn new(inner: Box<dyn InputStream>) -> Self {
        Self { inner }
    }

    /// Give the stream back, e.g. to close it explicitly.
    pub fn into_inner(self) -> Box<dyn InputStream> {
        self.inner
    }
}

impl io::Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| match e {
            StoreError::Io(io_err) => io_err,
            StoreError::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, e),
            other => io::Error::other(other),
        })
    }
}
