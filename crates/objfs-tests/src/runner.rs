//! Runs scenarios one after another, each in its own session.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use objfs_engine::ComputeEngine;
use tracing::{info, warn};

use crate::gate::EnablementGate;
use crate::report::{RunReport, ScenarioOutcome, ScenarioRecord};
use crate::scenario::{Scenario, ScenarioContext};
use crate::session::SessionManager;
use crate::timing::LatencyRecorder;

/// Executes scenarios under the gate and records an outcome for each.
pub struct ScenarioRunner<'a> {
    sessions: &'a SessionManager,
    engine: &'a dyn ComputeEngine,
    only: Vec<String>,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(sessions: &'a SessionManager, engine: &'a dyn ComputeEngine) -> Self {
        Self {
            sessions,
            engine,
            only: Vec::new(),
        }
    }

    /// Run only the named scenarios. An empty list runs everything.
    pub fn with_filter(mut self, names: Vec<String>) -> Self {
        self.only = names;
        self
    }

    /// Scenarios that pass the name filter, in catalog order.
    pub fn select<'s>(&self, scenarios: &'s [Scenario]) -> Vec<&'s Scenario> {
        scenarios
            .iter()
            .filter(|s| self.only.is_empty() || self.only.iter().any(|n| n == s.name()))
            .collect()
    }

    pub fn run(&self, scenarios: &[Scenario]) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new("objfs-conform");
        for scenario in self.select(scenarios) {
            report.add(self.run_one(scenario));
        }
        report.duration = started.elapsed();
        info!(summary = %report.summary_line(), "run complete");
        report
    }

    /// Gate, acquire, run, release. Never panics and never returns early.
    pub fn run_one(&self, scenario: &Scenario) -> ScenarioRecord {
        let started = Instant::now();
        let name = scenario.name();
        let config = self.sessions.config();

        if let Some(reason) = EnablementGate::new(config).disabled_reason() {
            info!(scenario = name, %reason, "scenario skipped");
            return ScenarioRecord::new(name, ScenarioOutcome::Skip(reason), started.elapsed());
        }
        if let Some(key) = scenario
            .required_options()
            .iter()
            .find(|key| config.get_non_empty(key).is_none())
        {
            let reason = format!("{key} is not configured");
            info!(scenario = name, %reason, "scenario skipped");
            return ScenarioRecord::new(name, ScenarioOutcome::Skip(reason), started.elapsed());
        }

        let mut session = match self.sessions.acquire(name) {
            Ok(session) => session,
            Err(e) => {
                warn!(scenario = name, error = %e, "session acquisition failed");
                return ScenarioRecord::new(
                    name,
                    ScenarioOutcome::Fail(e.to_string()),
                    started.elapsed(),
                );
            }
        };

        let recorder = LatencyRecorder::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = ScenarioContext {
                session: &mut session,
                engine: self.engine,
                recorder: &recorder,
                config,
            };
            scenario.run(&mut ctx)
        }));
        let mut outcome = match result {
            Ok(Ok(())) => ScenarioOutcome::Pass,
            Ok(Err(e)) => ScenarioOutcome::Fail(e.to_string()),
            Err(payload) => {
                ScenarioOutcome::Fail(format!("panicked: {}", panic_message(&*payload)))
            }
        };

        if let Err(e) = session.release() {
            outcome = match outcome {
                ScenarioOutcome::Fail(reason) => {
                    ScenarioOutcome::Fail(format!("{reason}; release failed: {e}"))
                }
                _ => ScenarioOutcome::Fail(format!("release failed: {e}")),
            };
        }

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        match &outcome {
            ScenarioOutcome::Fail(reason) => {
                warn!(scenario = name, elapsed_ms, %reason, "scenario failed")
            }
            _ => info!(scenario = name, elapsed_ms, "scenario passed"),
        }
        ScenarioRecord::new(name, outcome, elapsed).with_timings(recorder.timings())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
