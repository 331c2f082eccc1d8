//! Bindings that can be cut off by their owner.
//!
//! Every clone of a revocable binding shares one flag; once the [`Revoker`] fires, each
//! filesystem call on any of them fails with [`StoreError::Revoked`]. Streams opened
//! before revocation keep working until closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path;

use crate::binding::FileSystemBinding;
use crate::error::{StoreError, StoreResult};
use crate::fs::{FileStatus, FileSystem, InputStream};

/// Cuts off every binding guarded by it.
#[derive(Debug, Clone, Default)]
pub struct Revoker {
    revoked: Arc<AtomicBool>,
}

impl Revoker {
    /// A revoker that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every filesystem call through the guarded bindings fail.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Whether `revoke` has run.
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }
}

struct RevocableFileSystem {
    uri: String,
    inner: Arc<dyn FileSystem>,
    revoked: Arc<AtomicBool>,
}

impl RevocableFileSystem {
    fn live(&self) -> StoreResult<&dyn FileSystem> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(StoreError::Revoked {
                uri: self.uri.clone(),
            });
        }
        Ok(self.inner.as_ref())
    }
}

impl FileSystem for RevocableFileSystem {
    fn describe(&self) -> String {
        format!("revocable({})", self.inner.describe())
    }

    fn mkdirs(&self, path: &Path) -> StoreResult<()> {
        self.live()?.mkdirs(path)
    }

    fn delete(&self, path: &Path, recursive: bool) -> StoreResult<bool> {
        self.live()?.delete(path, recursive)
    }

    fn stat(&self, path: &Path) -> StoreResult<FileStatus> {
        self.live()?.stat(path)
    }

    fn list_status(&self, path: &Path) -> StoreResult<Vec<FileStatus>> {
        self.live()?.list_status(path)
    }

    fn create(&self, path: &Path, data: Bytes) -> StoreResult<()> {
        self.live()?.create(path, data)
    }

    fn open(&self, path: &Path) -> StoreResult<Box<dyn InputStream>> {
        self.live()?.open(path)
    }
}

impl FileSystemBinding {
    /// A copy of this binding whose filesystem stops working once `revoker` fires.
    /// `self` is unaffected.
    pub fn guarded_by(&self, revoker: &Revoker) -> FileSystemBinding {
        let fs = RevocableFileSystem {
            uri: self.uri().to_string(),
            inner: self.filesystem(),
            revoked: Arc::clone(&revoker.revoked),
        };
        FileSystemBinding::from_parts(
            self.uri().clone(),
            self.base().clone(),
            self.options().clone(),
            Arc::new(fs),
        )
    }
}
