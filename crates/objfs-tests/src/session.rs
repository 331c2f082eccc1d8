//! Filesystem sessions: one bound store and one isolated test directory per scenario.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use objfs_store::{credential_options, resolve, FileSystemBinding, Path, Revoker, StoreError};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{RunConfiguration, ACCOUNT_ID_KEY, ACCOUNT_SECRET_KEY, URI_KEY};
use crate::error::{HarnessError, HarnessResult};
use crate::gate::EnablementGate;

/// Prefix of every generated test directory name.
pub const TEST_DIRECTORY_PREFIX: &str = "objfs-test-";

/// Opens sessions against the configured target store.
#[derive(Debug)]
pub struct SessionManager {
    config: RunConfiguration,
    acquisitions: AtomicUsize,
}

impl SessionManager {
    /// Manager for `config`.
    pub fn new(config: RunConfiguration) -> Self {
        Self {
            config,
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Binding resolutions attempted so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Open a session for `scenario` with a fresh `objfs-test-<scenario>-<uuid>` directory.
    pub fn acquire(&self, scenario: &str) -> HarnessResult<Session> {
        let name = format!(
            "{TEST_DIRECTORY_PREFIX}{}-{}",
            sanitize(scenario),
            uuid::Uuid::new_v4()
        );
        self.acquire_with_directory(scenario, &name)
    }

    /// Open a session whose test directory is `directory_name` under the target base.
    ///
    /// Fails with `DirectoryCollision` if the directory already exists.
    pub fn acquire_with_directory(
        &self,
        scenario: &str,
        directory_name: &str,
    ) -> HarnessResult<Session> {
        let gate = EnablementGate::new(&self.config);
        if let Some(reason) = gate.disabled_reason() {
            return Err(HarnessError::Disabled { reason });
        }

        let uri = self.config.get_non_empty(URI_KEY).unwrap_or_default().to_string();
        let scheme = Url::parse(&uri)
            .map_err(|e| StoreError::InvalidUri {
                uri: uri.clone(),
                reason: e.to_string(),
            })?
            .scheme()
            .to_string();

        let mut options = self.config.store_options();
        options.extend(credential_options(
            &scheme,
            self.config.get(ACCOUNT_ID_KEY).unwrap_or_default(),
            self.config.get(ACCOUNT_SECRET_KEY).unwrap_or_default(),
        ));

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let binding = bind(&uri, &options)?;

        let test_directory = binding.join(directory_name);
        match binding.fs().stat(&test_directory) {
            Ok(_) => {
                return Err(HarnessError::DirectoryCollision {
                    path: binding.qualify(&test_directory),
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(connection_error(&uri, e)),
        }
        binding
            .fs()
            .mkdirs(&test_directory)
            .map_err(|e| connection_error(&uri, e))?;

        info!(
            scenario,
            directory = %binding.qualify(&test_directory),
            "session acquired"
        );
        let revoker = Revoker::new();
        Ok(Session {
            scenario: scenario.to_string(),
            uri,
            options,
            primary: binding.guarded_by(&revoker),
            teardown: binding,
            revoker,
            test_directory,
            verified: false,
        })
    }
}

fn connection_error(uri: &str, err: StoreError) -> HarnessError {
    HarnessError::Connection {
        uri: uri.to_string(),
        reason: err.to_string(),
    }
}

/// Resolve `uri` and probe it with a listing of its base path.
///
/// Driver failures come back as `Connection` with the driver's message intact.
fn bind(uri: &str, options: &BTreeMap<String, String>) -> HarnessResult<FileSystemBinding> {
    let binding = resolve(uri, options).map_err(|e| match e {
        StoreError::Connection { uri, reason } => HarnessError::Connection { uri, reason },
        other => HarnessError::Store(other),
    })?;
    match binding.fs().list_status(binding.base()) {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(connection_error(uri, e)),
    }
    debug!(uri, "binding probed");
    Ok(binding)
}

fn sanitize(scenario: &str) -> String {
    scenario
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// A bound filesystem plus the test directory it owns.
///
/// Every binding the session hands out shares one [`Revoker`]. Release fires it, so
/// clones kept by a scenario fail with `BindingReleased` from then on. The session keeps
/// an unguarded copy of the primary binding for teardown only.
pub struct Session {
    scenario: String,
    uri: String,
    options: BTreeMap<String, String>,
    primary: FileSystemBinding,
    teardown: FileSystemBinding,
    revoker: Revoker,
    test_directory: Path,
    verified: bool,
}

impl Session {
    /// Scenario this session belongs to.
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// The primary binding.
    pub fn binding(&self) -> HarnessResult<&FileSystemBinding> {
        if self.revoker.is_revoked() {
            return Err(HarnessError::BindingReleased {
                uri: self.uri.clone(),
            });
        }
        Ok(&self.primary)
    }

    /// Store path of the test directory.
    pub fn test_directory(&self) -> &Path {
        &self.test_directory
    }

    /// `relative` under the test directory.
    pub fn path(&self, relative: &str) -> Path {
        objfs_store::join_path(&self.test_directory, relative)
    }

    /// Whether release has run, successfully or not.
    pub fn is_released(&self) -> bool {
        self.revoker.is_revoked()
    }

    /// A second binding to the target URI with `extra` options layered on top.
    pub fn alternate_binding(
        &self,
        extra: &BTreeMap<String, String>,
    ) -> HarnessResult<FileSystemBinding> {
        self.bind_related(&self.uri, extra)
    }

    /// A binding to another URI using this session's credentials, such as a fixture.
    pub fn bind_related(
        &self,
        uri: &str,
        extra: &BTreeMap<String, String>,
    ) -> HarnessResult<FileSystemBinding> {
        if self.revoker.is_revoked() {
            return Err(HarnessError::BindingReleased {
                uri: uri.to_string(),
            });
        }
        let mut options = self.options.clone();
        options.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(bind(uri, &options)?.guarded_by(&self.revoker))
    }

    /// Revoke every binding, remove the test directory, confirm it is gone.
    ///
    /// Idempotent: each call deletes again and re-checks that `stat` reports NotFound. A
    /// directory already removed by the scenario is fine.
    pub fn release(&mut self) -> HarnessResult<()> {
        self.revoker.revoke();
        let qualified = self.teardown.qualify(&self.test_directory);

        match self.teardown.fs().delete(&self.test_directory, true) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        match self.teardown.fs().stat(&self.test_directory) {
            Err(e) if e.is_not_found() => {
                if !self.verified {
                    info!(scenario = %self.scenario, directory = %qualified, "session released");
                }
                self.verified = true;
                Ok(())
            }
            Ok(status) => Err(HarnessError::TeardownDefect {
                path: qualified,
                detail: format!(
                    "stat still reports a {}",
                    if status.is_directory { "directory" } else { "file" }
                ),
            }),
            Err(e) => Err(HarnessError::TeardownDefect {
                path: qualified,
                detail: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("scenario", &self.scenario)
            .field("uri", &self.uri)
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .field("test_directory", &self.test_directory.as_ref())
            .field("released", &self.revoker.is_revoked())
            .field("verified", &self.verified)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.verified {
            return;
        }
        if let Err(e) = self.release() {
            warn!(scenario = %self.scenario, error = %e, "session release failed on drop");
        }
    }
}
