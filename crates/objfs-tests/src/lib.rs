//! objfs conformance harness
//!
//! Validates that an object-store-backed filesystem behaves the way a partitioned compute
//! engine expects (directory lifecycle, stat visibility, write/read round trips) and times
//! the stream operations whose cost regresses most often (seek, read, close).
//!
//! Remote scenarios are opt-in through [`EnablementGate`]; each runs in its own
//! [`Session`] whose test directory is removed on every exit path.

pub mod config;
pub mod error;
pub mod gate;
pub mod profile;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod timing;
pub mod verifier;

pub use config::{ConfigError, RunConfiguration};
pub use error::{HarnessError, HarnessResult};
pub use gate::EnablementGate;
pub use profile::{
    CloseCostCheck, CloseCostReport, SeekReadProfile, DEFAULT_PROFILE_SEED, PROFILE_LABELS,
};
pub use report::{RunReport, ScenarioOutcome, ScenarioRecord};
pub use runner::ScenarioRunner;
pub use scenario::{standard_scenarios, Scenario, ScenarioContext};
pub use session::{Session, SessionManager};
pub use timing::{LatencyRecorder, OperationTiming};
pub use verifier::{check_layout, RoundTripVerifier, VerificationReport};
