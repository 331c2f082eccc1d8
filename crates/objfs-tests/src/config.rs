//! Run configuration: a flat, immutable map of dotted option names to string values.
//!
//! Files are TOML or JSON, picked by extension. Nested tables flatten into dotted keys, so
//! `[objfs.test] uri = "..."` and `"objfs.test.uri" = "..."` are the same option. String
//! values go through `${VAR}` and `~` expansion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use objfs_engine::EngineConfig;
use objfs_store::READAHEAD_OPTION;
use thiserror::Error;
use url::Url;

/// Opt-in flag for remote tests.
pub const ENABLED_KEY: &str = "objfs.test.enabled";
/// Account id used as the store credential.
pub const ACCOUNT_ID_KEY: &str = "objfs.test.account.id";
/// Account secret used as the store credential.
pub const ACCOUNT_SECRET_KEY: &str = "objfs.test.account.secret";
/// Target storage URI.
pub const URI_KEY: &str = "objfs.test.uri";
/// Local scratch directory.
pub const SCRATCH_DIR_KEY: &str = "objfs.test.scratch.dir";
/// Known object read by the latency profile and the fixture row count.
pub const FIXTURE_URI_KEY: &str = "objfs.test.fixture.uri";
/// Expected line count of the fixture.
pub const FIXTURE_ROWS_KEY: &str = "objfs.test.fixture.rows";
/// Seed of the seek/read profile's random positioned read.
pub const PROFILE_SEED_KEY: &str = "objfs.test.profile.seed";
/// Worker threads of the in-process engine.
pub const ENGINE_WORKERS_KEY: &str = "objfs.engine.workers";
/// Engine partitions per dataset.
pub const ENGINE_PARTITIONS_KEY: &str = "objfs.engine.partitions";
/// Prefix of options passed to the store driver unchanged.
pub const STORE_OPTION_PREFIX: &str = "objfs.store.";

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// The config file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML/JSON.
    #[error("Cannot parse {path}: {reason}")]
    Parse {
        /// The config file.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// The extension is neither `.toml` nor `.json`.
    #[error("Unsupported config file extension: {0}")]
    UnsupportedFormat(String),

    /// A value is an array or otherwise not representable as one option.
    #[error("Option {key} must be a string, number or boolean")]
    UnsupportedValue {
        /// The option.
        key: String,
    },

    /// `${VAR}` expansion failed.
    #[error("Cannot expand {key}: {reason}")]
    Expand {
        /// The option.
        key: String,
        /// Why.
        reason: String,
    },

    /// A value has the wrong shape for its option.
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// The option.
        key: String,
        /// The rejected value.
        value: String,
    },
}

/// Parse a boolean flag. Anything unrecognized is `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Options for one harness run.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RunConfiguration {
    options: BTreeMap<String, String>,
}

impl RunConfiguration {
    /// Build from literal pairs. Values are taken as-is, without expansion.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            options: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Load a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let mut options = BTreeMap::new();
        match ext.as_str() {
            "toml" => {
                let table: toml::Table = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                    path: display.clone(),
                    reason: e.to_string(),
                })?;
                for (key, value) in table {
                    flatten_toml(key, value, &mut options)?;
                }
            }
            "json" => {
                let value: serde_json::Value =
                    serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                        path: display.clone(),
                        reason: e.to_string(),
                    })?;
                let serde_json::Value::Object(map) = value else {
                    return Err(ConfigError::Parse {
                        path: display,
                        reason: "top level must be an object".to_string(),
                    });
                };
                for (key, value) in map {
                    flatten_json(key, value, &mut options)?;
                }
            }
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        }

        for (key, value) in options.iter_mut() {
            let expanded = shellexpand::full(value.as_str())
                .map_err(|e| ConfigError::Expand {
                    key: key.clone(),
                    reason: e.to_string(),
                })?
                .into_owned();
            *value = expanded;
        }
        Ok(Self { options })
    }

    /// Raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Value of `key` if present and not blank.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Unsigned integer option.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        self.get_non_empty(key)
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: v.to_string(),
                })
            })
            .transpose()
    }

    /// All options, sorted by name.
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Options handed to the filesystem binding: `objfs.store.*` with the prefix
    /// stripped, plus the binding's own `objfs.readahead`.
    pub fn store_options(&self) -> BTreeMap<String, String> {
        let mut store = BTreeMap::new();
        for (key, value) in &self.options {
            if let Some(raw) = key.strip_prefix(STORE_OPTION_PREFIX) {
                if !raw.is_empty() {
                    store.insert(raw.to_string(), value.clone());
                }
            }
        }
        if let Some(readahead) = self.get_non_empty(READAHEAD_OPTION) {
            store.insert(READAHEAD_OPTION.to_string(), readahead.to_string());
        }
        store
    }

    /// Local scratch directory, the OS temp dir when unset.
    pub fn scratch_dir(&self) -> PathBuf {
        self.get_non_empty(SCRATCH_DIR_KEY)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Engine settings. Its ambient filesystem is the scratch directory.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let scratch = self.scratch_dir();
        let default_fs = Url::from_directory_path(&scratch).map_err(|_| ConfigError::InvalidValue {
            key: SCRATCH_DIR_KEY.to_string(),
            value: scratch.display().to_string(),
        })?;
        let mut config = EngineConfig::default().with_default_fs(default_fs.as_str());
        if let Some(workers) = self.get_u64(ENGINE_WORKERS_KEY)? {
            config = config.with_worker_threads(workers as usize);
        }
        if let Some(partitions) = self.get_u64(ENGINE_PARTITIONS_KEY)? {
            config = config.with_partitions(partitions as usize);
        }
        Ok(config)
    }
}

// Secrets live in here; show names only.
impl std::fmt::Debug for RunConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfiguration")
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn flatten_toml(
    key: String,
    value: toml::Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    let scalar = match value {
        toml::Value::Table(table) => {
            for (child, v) in table {
                flatten_toml(join_key(&key, &child), v, out)?;
            }
            return Ok(());
        }
        toml::Value::String(s) => s,
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        toml::Value::Array(_) => return Err(ConfigError::UnsupportedValue { key }),
    };
    out.insert(key, scalar);
    Ok(())
}

fn flatten_json(
    key: String,
    value: serde_json::Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    let scalar = match value {
        serde_json::Value::Object(map) => {
            for (child, v) in map {
                flatten_json(join_key(&key, &child), v, out)?;
            }
            return Ok(());
        }
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => return Ok(()),
        serde_json::Value::Array(_) => return Err(ConfigError::UnsupportedValue { key }),
    };
    out.insert(key, scalar);
    Ok(())
}
