//! URI resolution into filesystem bindings.
//!
//! A binding is the pair (URI, options) plus the live filesystem created from them.
//! Options prefixed with `objfs.` configure this crate; every other option is handed to
//! the object store builder for the URI's scheme (`aws_region`, `aws_endpoint`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use object_store::path::Path;
use object_store::ObjectStore;
use tracing::debug;
use url::Url;

use crate::error::{StoreError, StoreResult};
use crate::fs::FileSystem;
use crate::memory::shared_memory_store;
use crate::object_fs::{ObjectStoreFileSystem, DEFAULT_READAHEAD};

/// Binding option: read-ahead window in bytes for opened streams.
pub const READAHEAD_OPTION: &str = "objfs.readahead";

const LOCAL_OPTION_PREFIX: &str = "objfs.";

/// Store option pairs that carry an account id and secret for `scheme`.
///
/// Schemes without credentials (`file`, `memory`) yield nothing.
pub fn credential_options(
    scheme: &str,
    account_id: &str,
    account_secret: &str,
) -> Vec<(String, String)> {
    match scheme {
        "s3" | "s3a" => vec![
            ("aws_access_key_id".to_string(), account_id.to_string()),
            ("aws_secret_access_key".to_string(), account_secret.to_string()),
        ],
        "az" | "abfs" | "abfss" | "adl" | "azure" => vec![
            ("azure_storage_account_name".to_string(), account_id.to_string()),
            ("azure_storage_account_key".to_string(), account_secret.to_string()),
        ],
        "gs" => vec![(
            "google_service_account_key".to_string(),
            account_secret.to_string(),
        )],
        _ => Vec::new(),
    }
}

/// An authenticated handle to a filesystem URI.
#[derive(Clone)]
pub struct FileSystemBinding {
    uri: Url,
    root: Url,
    base: Path,
    options: BTreeMap<String, String>,
    fs: Arc<dyn FileSystem>,
}

impl FileSystemBinding {
    /// Assemble a binding around an existing filesystem.
    pub fn from_parts(
        uri: Url,
        base: Path,
        options: BTreeMap<String, String>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            root: root_of(&uri),
            uri,
            base,
            options,
            fs,
        }
    }

    /// The URI this binding was resolved from.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// `scheme://authority/`, the default-filesystem form of the URI.
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Key prefix named by the URI path.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Options the binding was created with, credentials included.
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// The bound filesystem.
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Shared handle to the bound filesystem.
    pub fn filesystem(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.fs)
    }

    /// `base` extended by the `/`-separated segments of `relative`.
    pub fn join(&self, relative: &str) -> Path {
        join_path(&self.base, relative)
    }

    /// Fully qualified URI string for a key in this store.
    pub fn qualify(&self, path: &Path) -> String {
        format!("{}{}", self.root, path)
    }
}

impl fmt::Debug for FileSystemBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemBinding")
            .field("uri", &self.uri.as_str())
            .field("base", &self.base.as_ref())
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .field("fs", &self.fs.describe())
            .finish()
    }
}

/// `base` extended by the non-empty `/`-separated segments of `relative`.
pub fn join_path(base: &Path, relative: &str) -> Path {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.clone(), |path, part| path.child(part))
}

fn root_of(uri: &Url) -> Url {
    let mut root = uri.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

/// Resolve `uri` into a binding, applying `options`.
///
/// `memory://<name>/` URIs map onto the process-wide named in-memory stores; every other
/// scheme goes through the object store URL parser.
pub fn resolve(uri: &str, options: &BTreeMap<String, String>) -> StoreResult<FileSystemBinding> {
    let url = Url::parse(uri).map_err(|e| StoreError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    let readahead = match options.get(READAHEAD_OPTION) {
        Some(value) => value.parse::<usize>().map_err(|_| StoreError::InvalidOption {
            key: READAHEAD_OPTION.to_string(),
            value: value.clone(),
        })?,
        None => DEFAULT_READAHEAD,
    };

    let (store, base): (Arc<dyn ObjectStore>, Path) = if url.scheme() == "memory" {
        let name = url.host_str().unwrap_or_default();
        let base = Path::from_url_path(url.path()).map_err(|e| StoreError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        (shared_memory_store(name), base)
    } else {
        let store_options = options
            .iter()
            .filter(|(key, _)| !key.starts_with(LOCAL_OPTION_PREFIX))
            .map(|(key, value)| (key.as_str(), value.clone()));
        let (store, base) =
            object_store::parse_url_opts(&url, store_options).map_err(|e| match e {
                object_store::Error::NotImplemented => StoreError::InvalidUri {
                    uri: uri.to_string(),
                    reason: format!("scheme {} is not supported", url.scheme()),
                },
                other => StoreError::Connection {
                    uri: uri.to_string(),
                    reason: other.to_string(),
                },
            })?;
        (Arc::from(store), base)
    };

    debug!(uri = %url, base = %base, readahead, "resolved filesystem binding");
    let fs = ObjectStoreFileSystem::new(store).with_readahead(readahead);
    Ok(FileSystemBinding::from_parts(
        url,
        base,
        options.clone(),
        Arc::new(fs),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn no_options() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_credential_options_s3() {
        let opts = credential_options("s3a", "AKIA", "secret");
        assert_eq!(
            opts,
            vec![
                ("aws_access_key_id".to_string(), "AKIA".to_string()),
                ("aws_secret_access_key".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn test_credential_options_azure() {
        let opts = credential_options("abfs", "account", "key");
        assert_eq!(opts[0].0, "azure_storage_account_name");
        assert_eq!(opts[1].0, "azure_storage_account_key");
    }

    #[test]
    fn test_credential_options_local_schemes_empty() {
        assert!(credential_options("file", "id", "secret").is_empty());
        assert!(credential_options("memory", "id", "secret").is_empty());
    }

    #[test]
    fn test_resolve_memory_uri() {
        let binding = resolve("memory://binding-basic/some/prefix", &no_options()).unwrap();
        assert_eq!(binding.base().as_ref(), "some/prefix");
        assert_eq!(binding.root().as_str(), "memory://binding-basic/");
        assert_eq!(binding.join("a/b").as_ref(), "some/prefix/a/b");
    }

    #[test]
    fn test_memory_bindings_share_objects() {
        let first = resolve("memory://binding-shared/", &no_options()).unwrap();
        let second = resolve("memory://binding-shared/", &no_options()).unwrap();
        let key = Path::from("k");
        first.fs().create(&key, Bytes::from_static(b"v")).unwrap();
        assert_eq!(second.fs().stat(&key).unwrap().length, 1);
    }

    #[test]
    fn test_resolve_invalid_uri() {
        let err = resolve("not a uri", &no_options()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUri { .. }));
    }

    #[test]
    fn test_resolve_rejects_bad_readahead() {
        let mut options = no_options();
        options.insert(READAHEAD_OPTION.to_string(), "lots".to_string());
        let err = resolve("memory://binding-readahead/", &options).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOption { .. }));
    }

    #[test]
    fn test_resolve_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Url::from_directory_path(dir.path()).unwrap();
        let binding = resolve(uri.as_str(), &no_options()).unwrap();
        let key = binding.join("x.txt");
        binding.fs().create(&key, Bytes::from_static(b"abc")).unwrap();
        assert!(dir.path().join("x.txt").exists());
        assert_eq!(binding.fs().stat(&key).unwrap().length, 3);
    }

    #[test]
    fn test_debug_hides_option_values() {
        let mut options = no_options();
        options.insert("aws_secret_access_key".to_string(), "hunter2".to_string());
        let binding = resolve("memory://binding-debug/", &options).unwrap();
        let rendered = format!("{:?}", binding);
        assert!(rendered.contains("aws_secret_access_key"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_qualify() {
        let binding = resolve("memory://binding-qualify/base", &no_options()).unwrap();
        let path = binding.join("f");
        assert_eq!(binding.qualify(&path), "memory://binding-qualify/base/f");
    }
}
