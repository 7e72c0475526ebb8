//! Normalised device readings.

use serde::{Deserialize, Serialize};

/// Outcome of probing a printer before dispatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Operational and idle: may accept a job.
    Available,
    /// Reported a well-formed state other than idle.
    Busy,
    /// Network failure, timeout, error status or malformed response.
    Unreachable,
}

/// Active-job progress as reported by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Machine state text (e.g. `Operational`, `Printing`).
    pub state: String,
    /// 0..=100, `None` when the device has no active file.
    pub percent_complete: Option<f64>,
    /// Seconds, `None` when the device cannot estimate.
    pub time_remaining_secs: Option<i64>,
}

impl JobProgress {
    /// Complete only when idle AND at 100% AND nothing remaining.
    ///
    /// Devices lag in updating state after the last move, so any single signal
    /// on its own is not trusted. Float noise above 100 counts as 100.
    pub fn is_complete(&self) -> bool {
        is_operational_state(&self.state)
            && self.percent_complete.is_some_and(|p| p >= 100.0)
            && self.time_remaining_secs == Some(0)
    }
}

/// Outcome of a progress query.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressProbe {
    Reported(JobProgress),
    Unreachable,
}

impl ProgressProbe {
    pub fn is_complete(&self) -> bool {
        matches!(self, ProgressProbe::Reported(p) if p.is_complete())
    }
}

/// Whether a reported machine state means "operational and idle".
pub fn is_operational_state(state: &str) -> bool {
    let state = state.trim();
    state.eq_ignore_ascii_case("operational") || state.eq_ignore_ascii_case("idle")
}
