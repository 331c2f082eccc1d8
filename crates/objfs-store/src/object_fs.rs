//! Filesystem semantics layered over an `object_store::ObjectStore`.

use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::fs::{FileStatus, FileSystem, InputStream, DIR_MARKER};
use crate::runtime::block_on;

/// Default read-ahead window for [`ObjectInputStream`].
pub const DEFAULT_READAHEAD: usize = 64 * 1024;

/// A [`FileSystem`] backed by any object store driver.
pub struct ObjectStoreFileSystem {
    store: Arc<dyn ObjectStore>,
    readahead: usize,
}

impl ObjectStoreFileSystem {
    /// Wrap a driver with the default read-ahead.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            readahead: DEFAULT_READAHEAD,
        }
    }

    /// Set the read-ahead window used by streams this filesystem opens.
    pub fn with_readahead(mut self, readahead: usize) -> Self {
        self.readahead = readahead.max(1);
        self
    }

    /// Configured read-ahead window.
    pub fn readahead(&self) -> usize {
        self.readahead
    }

    /// The underlying driver.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

impl FileSystem for ObjectStoreFileSystem {
    fn describe(&self) -> String {
        self.store.to_string()
    }

    fn mkdirs(&self, path: &Path) -> StoreResult<()> {
        let store = Arc::clone(&self.store);
        let marker = path.child(DIR_MARKER);
        debug!(path = %path, "mkdirs");
        block_on(async move {
            store.put(&marker, PutPayload::new()).await?;
            Ok(())
        })
    }

    fn delete(&self, path: &Path, recursive: bool) -> StoreResult<bool> {
        let store = Arc::clone(&self.store);
        let location = path.clone();
        block_on(async move {
            match store.head(&location).await {
                Ok(_) => {
                    store.delete(&location).await?;
                    debug!(path = %location, "deleted object");
                    return Ok(true);
                }
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            let children: Vec<Path> = store
                .list(Some(&location))
                .map_ok(|meta| meta.location)
                .try_collect()
                .await?;
            if children.is_empty() {
                return Ok(false);
            }

            let own_marker = location.child(DIR_MARKER);
            if !recursive && children.iter().any(|child| *child != own_marker) {
                return Err(StoreError::DirectoryNotEmpty {
                    path: location.to_string(),
                });
            }

            for child in &children {
                match store.delete(child).await {
                    Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            debug!(path = %location, objects = children.len(), "deleted directory");
            Ok(true)
        })
    }

    fn stat(&self, path: &Path) -> StoreResult<FileStatus> {
        let store = Arc::clone(&self.store);
        let location = path.clone();
        block_on(async move {
            match store.head(&location).await {
                Ok(meta) => return Ok(FileStatus::file(meta.location, meta.size as u64)),
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            if has_objects_under(store.as_ref(), &location).await? {
                Ok(FileStatus::directory(location))
            } else {
                Err(StoreError::NotFound {
                    path: location.to_string(),
                })
            }
        })
    }

    fn list_status(&self, path: &Path) -> StoreResult<Vec<FileStatus>> {
        let store = Arc::clone(&self.store);
        let location = path.clone();
        block_on(async move {
            match store.head(&location).await {
                Ok(meta) => return Ok(vec![FileStatus::file(meta.location, meta.size as u64)]),
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            let listing = store.list_with_delimiter(Some(&location)).await?;
            let mut populated = !listing.objects.is_empty();
            let mut entries: Vec<FileStatus> = listing
                .objects
                .into_iter()
                .filter(|meta| meta.location.filename() != Some(DIR_MARKER))
                .map(|meta| FileStatus::file(meta.location, meta.size as u64))
                .collect();
            // Local disk reports leftover empty directories as prefixes.
            for prefix in listing.common_prefixes {
                if has_objects_under(store.as_ref(), &prefix).await? {
                    populated = true;
                    entries.push(FileStatus::directory(prefix));
                }
            }
            if !populated {
                return Err(StoreError::NotFound {
                    path: location.to_string(),
                });
            }
            entries.sort_by(|a, b| a.path.as_ref().cmp(b.path.as_ref()));
            Ok(entries)
        })
    }

    fn create(&self, path: &Path, data: Bytes) -> StoreResult<()> {
        let store = Arc::clone(&self.store);
        let location = path.clone();
        let size = data.len();
        block_on(async move {
            store.put(&location, PutPayload::from(data)).await?;
            debug!(path = %location, size, "created object");
            Ok(())
        })
    }

    fn open(&self, path: &Path) -> StoreResult<Box<dyn InputStream>> {
        let store = Arc::clone(&self.store);
        let location = path.clone();
        let meta = block_on({
            let store = Arc::clone(&store);
            async move { Ok(store.head(&location).await?) }
        })?;
        Ok(Box::new(ObjectInputStream::new(
            store,
            meta.location,
            meta.size as u64,
            self.readahead,
        )))
    }
}

async fn has_objects_under(store: &dyn ObjectStore, prefix: &Path) -> StoreResult<bool> {
    let mut objects = store.list(Some(prefix));
    match objects.next().await {
        Some(Ok(_)) => Ok(true),
        Some(Err(e)) => Err(e.into()),
        None => Ok(false),
    }
}

/// Seekable stream issuing ranged GETs with a read-ahead buffer.
///
/// `close` only drops the buffer; it never reads the remainder of the object.
pub struct ObjectInputStream {
    store: Arc<dyn ObjectStore>,
    path: Path,
    length: u64,
    pos: u64,
    readahead: usize,
    buffer: Bytes,
    buffer_start: u64,
    closed: bool,
}

impl ObjectInputStream {
    /// Open a stream over `path` of known `length`.
    pub fn new(store: Arc<dyn ObjectStore>, path: Path, length: u64, readahead: usize) -> Self {
        Self {
            store,
            path,
            length,
            pos: 0,
            readahead: readahead.max(1),
            buffer: Bytes::new(),
            buffer_start: 0,
            closed: false,
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed {
                path: self.path.to_string(),
            });
        }
        Ok(())
    }

    fn fetch(&self, range: Range<u64>) -> StoreResult<Bytes> {
        let store = Arc::clone(&self.store);
        let location = self.path.clone();
        let range = range.start as usize..range.end as usize;
        block_on(async move { Ok(store.get_range(&location, range).await?) })
    }

    fn buffered(&self) -> Range<u64> {
        self.buffer_start..self.buffer_start + self.buffer.len() as u64
    }
}

impl InputStream for ObjectInputStream {
    fn path(&self) -> &Path {
        &self.path
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> StoreResult<usize> {
        self.ensure_open()?;
        if buf.is_empty() || self.pos >= self.length {
            return Ok(0);
        }
        if !self.buffered().contains(&self.pos) {
            let window = self.readahead.max(buf.len()) as u64;
            let end = (self.pos + window).min(self.length);
            self.buffer = self.fetch(self.pos..end)?;
            self.buffer_start = self.pos;
            if self.buffer.is_empty() {
                return Ok(0);
            }
        }
        let offset = (self.pos - self.buffer_start) as usize;
        let available = &self.buffer[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn read_fully(&mut self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(());
        }
        let end = offset + buf.len() as u64;
        let eof = || StoreError::UnexpectedEof {
            path: self.path.to_string(),
            offset,
            wanted: buf.len(),
        };
        if end > self.length {
            return Err(eof());
        }
        let data = self.fetch(offset..end)?;
        if data.len() != buf.len() {
            return Err(eof());
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> StoreResult<()> {
        self.ensure_open()?;
        if offset > self.length {
            return Err(StoreError::InvalidSeek {
                path: self.path.to_string(),
                offset,
                length: self.length,
            });
        }
        self.pos = offset;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.buffer = Bytes::new();
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory_fs() -> ObjectStoreFileSystem {
        ObjectStoreFileSystem::new(Arc::new(InMemory::new()))
    }

    fn put(fs: &ObjectStoreFileSystem, key: &str, body: &'static [u8]) {
        fs.create(&Path::from(key), Bytes::from_static(body)).unwrap();
    }

    #[test]
    fn test_stat_missing_is_not_found() {
        let fs = memory_fs();
        let err = fs.stat(&Path::from("nothing/here")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_stat_file_reports_length() {
        let fs = memory_fs();
        put(&fs, "dir/file.txt", b"hello");
        let status = fs.stat(&Path::from("dir/file.txt")).unwrap();
        assert!(!status.is_directory);
        assert_eq!(status.length, 5);
    }

    #[test]
    fn test_stat_implicit_directory() {
        let fs = memory_fs();
        put(&fs, "dir/sub/file.txt", b"x");
        let status = fs.stat(&Path::from("dir/sub")).unwrap();
        assert!(status.is_directory);
        assert!(fs.stat(&Path::from("dir")).unwrap().is_directory);
    }

    #[test]
    fn test_mkdirs_makes_empty_directory_visible() {
        let fs = memory_fs();
        let dir = Path::from("a/b/c");
        fs.mkdirs(&dir).unwrap();
        assert!(fs.stat(&dir).unwrap().is_directory);
        assert!(fs.stat(&Path::from("a")).unwrap().is_directory);
        assert!(fs.list_status(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_list_status_hides_marker_and_sorts() {
        let fs = memory_fs();
        let dir = Path::from("out");
        fs.mkdirs(&dir).unwrap();
        put(&fs, "out/part-00001", b"2\n");
        put(&fs, "out/part-00000", b"1\n");
        put(&fs, "out/nested/x", b"x");
        let names: Vec<String> = fs
            .list_status(&dir)
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["nested", "part-00000", "part-00001"]);
    }

    #[test]
    fn test_list_status_of_missing_directory() {
        let fs = memory_fs();
        assert!(fs.list_status(&Path::from("missing")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_missing_returns_false() {
        let fs = memory_fs();
        assert!(!fs.delete(&Path::from("missing"), true).unwrap());
        assert!(!fs.delete(&Path::from("missing"), false).unwrap());
    }

    #[test]
    fn test_delete_recursive_removes_everything() {
        let fs = memory_fs();
        fs.mkdirs(&Path::from("tree")).unwrap();
        put(&fs, "tree/a", b"a");
        put(&fs, "tree/b/c", b"c");
        assert!(fs.delete(&Path::from("tree"), true).unwrap());
        assert!(fs.stat(&Path::from("tree")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_non_recursive_refuses_populated_directory() {
        let fs = memory_fs();
        put(&fs, "tree/a", b"a");
        let err = fs.delete(&Path::from("tree"), false).unwrap_err();
        assert!(matches!(err, StoreError::DirectoryNotEmpty { .. }));
        assert!(fs.exists(&Path::from("tree/a")).unwrap());
    }

    #[test]
    fn test_delete_non_recursive_removes_empty_directory() {
        let fs = memory_fs();
        fs.mkdirs(&Path::from("empty")).unwrap();
        assert!(fs.delete(&Path::from("empty"), false).unwrap());
        assert!(!fs.exists(&Path::from("empty")).unwrap());
    }

    #[test]
    fn test_delete_does_not_touch_sibling_prefix() {
        let fs = memory_fs();
        put(&fs, "run/a", b"a");
        put(&fs, "run-2/a", b"a");
        fs.delete(&Path::from("run"), true).unwrap();
        assert!(fs.exists(&Path::from("run-2/a")).unwrap());
    }

    #[test]
    fn test_stream_sequential_read_with_small_readahead() {
        let fs = memory_fs().with_readahead(3);
        put(&fs, "f", b"abcdefghij");
        let mut stream = fs.open(&Path::from("f")).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 2];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abcdefghij");
        assert_eq!(stream.pos(), 10);
    }

    #[test]
    fn test_stream_seek_and_read() {
        let fs = memory_fs();
        put(&fs, "f", b"0123456789");
        let mut stream = fs.open(&Path::from("f")).unwrap();
        stream.seek(7).unwrap();
        let mut buf = [0u8; 8];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"789");
        stream.seek(10).unwrap();
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_stream_seek_past_end_fails() {
        let fs = memory_fs();
        put(&fs, "f", b"0123");
        let mut stream = fs.open(&Path::from("f")).unwrap();
        let err = stream.seek(5).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSeek { offset: 5, length: 4, .. }));
    }

    #[test]
    fn test_read_fully_does_not_move_position() {
        let fs = memory_fs();
        put(&fs, "f", b"0123456789");
        let mut stream = fs.open(&Path::from("f")).unwrap();
        stream.seek(2).unwrap();
        let mut buf = [0u8; 3];
        stream.read_fully(5, &mut buf).unwrap();
        assert_eq!(&buf, b"567");
        assert_eq!(stream.pos(), 2);
    }

    #[test]
    fn test_read_fully_past_end_fails() {
        let fs = memory_fs();
        put(&fs, "f", b"0123");
        let mut stream = fs.open(&Path::from("f")).unwrap();
        let mut buf = [0u8; 3];
        let err = stream.read_fully(2, &mut buf).unwrap_err();
        assert!(matches!(err, StoreError::UnexpectedEof { offset: 2, wanted: 3, .. }));
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let fs = memory_fs();
        put(&fs, "f", b"data");
        let mut stream = fs.open(&Path::from("f")).unwrap();
        stream.close().unwrap();
        stream.close().unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(stream.read(&mut buf), Err(StoreError::Closed { .. })));
        assert!(matches!(stream.seek(0), Err(StoreError::Closed { .. })));
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let fs = memory_fs();
        let err = fs.open(&Path::from("missing")).err().unwrap();
        assert!(err.is_not_found());
    }
}
