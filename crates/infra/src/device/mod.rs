//! Device client.
//!
//! Translates scheduler intent (probe, submit, poll progress) into device
//! protocol calls. Transport failures never cross this boundary: they are
//! logged and folded into `Availability::Unreachable`, `false` or
//! `ProgressProbe::Unreachable`, and the scheduler retries on its next tick.

pub mod octoprint;

use printfarm_printing::{Availability, Job, Printer, ProgressProbe};

pub use octoprint::OctoPrintClient;

/// Device protocol adapter used by the scheduler.
#[async_trait::async_trait]
pub trait DeviceClient: Send + Sync {
    /// Whether the printer can accept a job right now.
    async fn query_availability(&self, printer: &Printer) -> Availability;

    /// Ask the printer to select the job's file and start printing.
    ///
    /// `true` only on an explicit success response.
    async fn submit_job(&self, printer: &Printer, job: &Job) -> bool;

    /// Progress of the printer's active job.
    async fn query_progress(&self, printer: &Printer) -> ProgressProbe;
}

/// Failure talking to a device. Internal to client implementations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("printer has no address or api key")]
    MissingEndpoint,
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("device answered with status {0}")]
    Status(u16),
    #[error("malformed device response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for DeviceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeviceError::Timeout
        } else if err.is_decode() {
            DeviceError::Malformed(err.to_string())
        } else {
            DeviceError::Transport(err.to_string())
        }
    }
}
