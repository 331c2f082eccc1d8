//! Opt-in gate for tests that reach a remote store.

use crate::config::{
    parse_flag, RunConfiguration, ACCOUNT_ID_KEY, ACCOUNT_SECRET_KEY, ENABLED_KEY, URI_KEY,
};

/// Options that must be present and non-blank for the gate to open.
pub const REQUIRED_KEYS: [&str; 3] = [ACCOUNT_ID_KEY, ACCOUNT_SECRET_KEY, URI_KEY];

/// Decides from configuration whether remote-backend scenarios may run.
///
/// Never fails: a missing or malformed option closes the gate.
#[derive(Debug, Clone, Copy)]
pub struct EnablementGate<'a> {
    config: &'a RunConfiguration,
}

impl<'a> EnablementGate<'a> {
    /// Gate over `config`.
    pub fn new(config: &'a RunConfiguration) -> Self {
        Self { config }
    }

    /// True iff the opt-in flag is set and every required option is present.
    pub fn is_enabled(&self) -> bool {
        self.disabled_reason().is_none()
    }

    /// Why the gate is closed, naming the first unmet condition.
    pub fn disabled_reason(&self) -> Option<String> {
        match self.config.get(ENABLED_KEY) {
            None => return Some(format!("{ENABLED_KEY} is not set")),
            Some(raw) => match parse_flag(raw) {
                Some(true) => {}
                Some(false) => return Some(format!("{ENABLED_KEY} is false")),
                None => return Some(format!("{ENABLED_KEY} is not a boolean: {raw:?}")),
            },
        }
        REQUIRED_KEYS
            .iter()
            .find(|key| self.config.get_non_empty(key).is_none())
            .map(|key| format!("{key} is missing"))
    }
}
