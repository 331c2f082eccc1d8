//! Run reports: per-scenario outcomes, JSON and JUnit XML rendering.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::timing::OperationTiming;

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ScenarioOutcome {
    /// Body and release succeeded.
    Pass,
    /// Body, acquisition or release failed.
    Fail(String),
    /// Not run: gate closed or a required option is missing.
    Skip(String),
}

impl ScenarioOutcome {
    /// Short status word.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioOutcome::Pass => "pass",
            ScenarioOutcome::Fail(_) => "fail",
            ScenarioOutcome::Skip(_) => "skip",
        }
    }

    /// Failure or skip reason.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ScenarioOutcome::Pass => None,
            ScenarioOutcome::Fail(reason) | ScenarioOutcome::Skip(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub name: String,
    pub outcome: ScenarioOutcome,
    pub duration: Duration,
    pub timings: Vec<OperationTiming>,
}

impl ScenarioRecord {
    pub fn new(name: &str, outcome: ScenarioOutcome, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            duration,
            timings: vec![],
        }
    }

    pub fn with_timings(mut self, timings: Vec<OperationTiming>) -> Self {
        self.timings = timings;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub timestamp: u64,
    pub duration: Duration,
    pub scenarios: Vec<ScenarioRecord>,
}

impl RunReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            duration: Duration::default(),
            scenarios: vec![],
        }
    }

    pub fn add(&mut self, record: ScenarioRecord) {
        self.scenarios.push(record);
    }

    /// Outcome recorded for `name`.
    pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
        self.scenarios
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.outcome)
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Pass))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Fail(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ScenarioOutcome::Skip(_)))
    }

    pub fn total(&self) -> usize {
        self.scenarios.len()
    }

    /// A run passes iff nothing failed. Skips do not count against it.
    pub fn is_passing(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&ScenarioOutcome) -> bool) -> usize {
        self.scenarios.iter().filter(|s| pred(&s.outcome)).count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_junit_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" errors=\"0\" time=\"{}\">\n",
            escape_xml(&self.name),
            self.total(),
            self.failed(),
            self.skipped(),
            self.duration.as_secs_f64()
        ));

        for scenario in &self.scenarios {
            xml.push_str(&format!(
                "  <testcase name=\"{}\" classname=\"{}\" time=\"{}\">\n",
                escape_xml(&scenario.name),
                escape_xml(&self.name),
                scenario.duration.as_secs_f64()
            ));
            match &scenario.outcome {
                ScenarioOutcome::Pass => {}
                ScenarioOutcome::Fail(reason) => {
                    let reason = escape_xml(reason);
                    xml.push_str(&format!(
                        "    <failure message=\"{}\">{}</failure>\n",
                        reason, reason
                    ));
                }
                ScenarioOutcome::Skip(reason) => {
                    xml.push_str(&format!(
                        "    <skipped message=\"{}\" />\n",
                        escape_xml(reason)
                    ));
                }
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>");
        xml
    }

    /// One line per scenario: status, name, duration, reason.
    pub fn lines(&self) -> Vec<String> {
        self.scenarios
            .iter()
            .map(|s| {
                let mut line = format!(
                    "{:<4} {:<26} {:>9.3}s",
                    s.outcome.as_str().to_uppercase(),
                    s.name,
                    s.duration.as_secs_f64()
                );
                if let Some(reason) = s.outcome.reason() {
                    line.push_str("  ");
                    line.push_str(reason);
                }
                line
            })
            .collect()
    }

    pub fn summary_line(&self) -> String {
        let total = self.total();
        let passed = self.passed();
        let failed = self.failed();
        let skipped = self.skipped();
        let time = self.duration.as_secs_f64();

        if failed > 0 {
            format!(
                "FAIL {}/{} ({} failed, {} skipped) in {:.2}s",
                passed, total, failed, skipped, time
            )
        } else if skipped > 0 {
            format!(
                "PASS {}/{} ({} skipped) in {:.2}s",
                passed, total, skipped, time
            )
        } else {
            format!("PASS {}/{} in {:.2}s", passed, total, time)
        }
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
