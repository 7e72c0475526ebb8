//! Print-job scheduling.
//!
//! ## Design
//!
//! - Two periodic tasks: the dispatcher assigns Waiting jobs to idle
//!   printers, the completion monitor detects finished prints
//! - The tasks share nothing but the job store; every transition is a
//!   conditional update on the stored status
//! - A completion immediately re-runs the dispatcher so the freed capacity is
//!   used without waiting for the next dispatch period
//! - Per-job failures are logged and recorded in the tick report; only a
//!   failure to load the tick's working set fails the tick
//!
//! ## Components
//!
//! - `Dispatcher` / `DispatchReport`
//! - `CompletionMonitor` / `CompletionReport`
//! - `Scheduler` / `SchedulerHandle`: tokio runner for both loops

pub mod completion;
pub mod dispatcher;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

use serde::Serialize;

use printfarm_core::{DomainError, JobId};

use crate::jobs::JobStoreError;
use crate::printers::RegistryError;

pub use completion::{CompletionMonitor, CompletionReport};
pub use dispatcher::{Assignment, DispatchReport, Dispatcher};
pub use runner::{DispatchTrigger, Scheduler, SchedulerHandle, SchedulerStats, StatsHandle};

/// Failure that aborts a whole tick or a single job's processing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// A job whose processing failed inside an otherwise successful tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub job_id: JobId,
    pub reason: String,
}
