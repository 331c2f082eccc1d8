//! Named scenarios and the standard catalog.

use std::collections::BTreeMap;

use bytes::Bytes;
use objfs_engine::{ComputeEngine, FsOverride};
use objfs_store::{Path, StoreResult, DEFAULT_READAHEAD, READAHEAD_OPTION};

use crate::config::{RunConfiguration, FIXTURE_ROWS_KEY, FIXTURE_URI_KEY, PROFILE_SEED_KEY};
use crate::error::{HarnessError, HarnessResult};
use crate::profile::{CloseCostCheck, SeekReadProfile};
use crate::session::Session;
use crate::timing::LatencyRecorder;
use crate::verifier::RoundTripVerifier;

/// Everything a scenario body may use.
pub struct ScenarioContext<'a> {
    /// The scenario's session. Released by the runner after the body returns.
    pub session: &'a mut Session,
    /// Engine jobs run on.
    pub engine: &'a dyn ComputeEngine,
    /// Per-scenario timings.
    pub recorder: &'a LatencyRecorder,
    /// The run configuration.
    pub config: &'a RunConfiguration,
}

type ScenarioBody = Box<dyn Fn(&mut ScenarioContext<'_>) -> HarnessResult<()> + Send + Sync>;

/// A named, independently skippable check.
pub struct Scenario {
    name: String,
    requires: Vec<String>,
    body: ScenarioBody,
}

impl Scenario {
    /// Scenario `name` running `body`.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ScenarioContext<'_>) -> HarnessResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            requires: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Skip unless configuration option `key` is set.
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.requires.push(key.into());
        self
    }

    /// Scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options that must be configured.
    pub fn required_options(&self) -> &[String] {
        &self.requires
    }

    /// Run the body.
    pub fn run(&self, ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
        (self.body)(ctx)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> HarnessResult<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::Violation(message()))
    }
}

/// Succeed only if `result` is a NotFound failure.
pub fn expect_not_found<T>(result: StoreResult<T>, path: &Path) -> HarnessResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
        Ok(_) => Err(HarnessError::Violation(format!("{path} still exists"))),
    }
}

/// Records written by the round-trip scenarios.
pub const ROUNDTRIP_RECORDS: u64 = 1000;

/// Size of the object written by `close-cost`.
pub const CLOSE_COST_OBJECT_SIZE: usize = 1 << 20;

/// The standard catalog, in run order.
pub fn standard_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("mkdirs-and-delete", mkdirs_and_delete),
        Scenario::new("stat-missing-path", stat_missing_path),
        Scenario::new("delete-missing-path", delete_missing_path),
        Scenario::new("roundtrip-1000", roundtrip),
        Scenario::new("roundtrip-cross-binding", roundtrip_cross_binding),
        Scenario::new("close-cost", close_cost),
        Scenario::new("seek-read-profile", seek_read_profile).requires(FIXTURE_URI_KEY),
        Scenario::new("fixture-line-count", fixture_line_count)
            .requires(FIXTURE_URI_KEY)
            .requires(FIXTURE_ROWS_KEY),
    ]
}

fn mkdirs_and_delete(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let binding = ctx.session.binding()?.clone();
    let fs = binding.fs();
    let top = ctx.session.path("a");
    let nested = ctx.session.path("a/b/c");

    ctx.recorder.time("mkdirs", || fs.mkdirs(&nested))?;
    let status = ctx.recorder.time("stat", || fs.stat(&nested))?;
    ensure(status.is_directory, || format!("{nested} is not a directory after mkdirs"))?;

    let deleted = ctx.recorder.time("delete", || fs.delete(&top, true))?;
    ensure(deleted, || format!("recursive delete of {top} reported nothing deleted"))?;
    expect_not_found(fs.stat(&nested), &nested)?;
    expect_not_found(fs.stat(&top), &top)
}

fn stat_missing_path(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let binding = ctx.session.binding()?.clone();
    let missing = ctx.session.path("does-not-exist");
    expect_not_found(ctx.recorder.time("stat", || binding.fs().stat(&missing)), &missing)
}

fn delete_missing_path(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let binding = ctx.session.binding()?.clone();
    let missing = ctx.session.path("does-not-exist");
    let deleted = ctx
        .recorder
        .time("delete", || binding.fs().delete(&missing, false))?;
    ensure(!deleted, || format!("delete of absent {missing} reported success"))
}

fn roundtrip(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let binding = ctx.session.binding()?.clone();
    let destination = ctx.session.path("roundtrip");
    RoundTripVerifier::new(ctx.engine, ctx.recorder).write_and_read_back(
        ROUNDTRIP_RECORDS,
        &binding,
        &binding,
        &destination,
    )?;
    Ok(())
}

fn roundtrip_cross_binding(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let binding = ctx.session.binding()?.clone();
    let current = binding
        .options()
        .get(READAHEAD_OPTION)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_READAHEAD);
    let alternate_readahead = if current == 4096 { 65536 } else { 4096 };
    let mut extra = BTreeMap::new();
    extra.insert(READAHEAD_OPTION.to_string(), alternate_readahead.to_string());
    let alternate = ctx.session.alternate_binding(&extra)?;

    let destination = ctx.session.path("roundtrip-cross");
    RoundTripVerifier::new(ctx.engine, ctx.recorder).write_and_read_back(
        ROUNDTRIP_RECORDS,
        &binding,
        &alternate,
        &destination,
    )?;
    Ok(())
}

fn close_cost(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let binding = ctx.session.binding()?.clone();
    let key = ctx.session.path("close-cost.bin");
    let body: Vec<u8> = (0..CLOSE_COST_OBJECT_SIZE).map(|i| (i % 251) as u8).collect();
    ctx.recorder
        .time("create", || binding.fs().create(&key, Bytes::from(body)))?;
    CloseCostCheck::new(ctx.recorder).run(binding.fs(), &key)?;
    Ok(())
}

fn seek_read_profile(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let uri = ctx.config.get_non_empty(FIXTURE_URI_KEY).unwrap_or_default().to_string();
    let fixture = ctx.session.bind_related(&uri, &BTreeMap::new())?;
    let mut profile = SeekReadProfile::new(ctx.recorder);
    if let Some(seed) = ctx.config.get_u64(PROFILE_SEED_KEY)? {
        profile = profile.with_seed(seed);
    }
    profile.run(fixture.fs(), fixture.base())?;
    Ok(())
}

fn fixture_line_count(ctx: &mut ScenarioContext<'_>) -> HarnessResult<()> {
    let uri = ctx.config.get_non_empty(FIXTURE_URI_KEY).unwrap_or_default().to_string();
    let expected = ctx.config.get_u64(FIXTURE_ROWS_KEY)?.unwrap_or_default();
    let fixture = ctx.session.bind_related(&uri, &BTreeMap::new())?;
    let job_fs = FsOverride::from_binding(&fixture);
    let actual = ctx.recorder.time("fixture-count", || {
        ctx.engine.submit_count(fixture.base(), Some(&job_fs))
    })?;
    if actual != expected {
        return Err(HarnessError::CountMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_are_unique() {
        let scenarios = standard_scenarios();
        let mut names: Vec<&str> = scenarios.iter().map(Scenario::name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 8);
    }

    #[test]
    fn test_fixture_scenarios_declare_requirements() {
        let scenarios = standard_scenarios();
        let profile = scenarios
            .iter()
            .find(|s| s.name() == "seek-read-profile")
            .unwrap();
        assert_eq!(profile.required_options(), [FIXTURE_URI_KEY.to_string()]);
        let count = scenarios
            .iter()
            .find(|s| s.name() == "fixture-line-count")
            .unwrap();
        assert_eq!(count.required_options().len(), 2);
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, || unreachable!()).is_ok());
        let err = ensure(false, || "nope".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Check failed: nope");
    }

    #[test]
    fn test_expect_not_found() {
        let path = Path::from("p");
        let missing: StoreResult<()> = Err(objfs_store::StoreError::NotFound {
            path: "p".to_string(),
        });
        assert!(expect_not_found(missing, &path).is_ok());
        assert!(matches!(
            expect_not_found(Ok(()), &path),
            Err(HarnessError::Violation(_))
        ));
    }
}
