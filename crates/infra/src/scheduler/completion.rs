//! Completion monitor: detects finished prints.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use printfarm_core::JobId;
use printfarm_printing::{Job, ProgressProbe, Status};

use super::{DispatchReport, Dispatcher, JobFailure, SchedulerError};
use crate::device::DeviceClient;
use crate::jobs::JobStore;
use crate::printers::PrinterRegistry;

/// Outcome of one completion tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub tick: Uuid,
    pub jobs_checked: usize,
    pub completed: Vec<JobId>,
    /// InProgress jobs that could not be checked because their record or
    /// printer is inconsistent.
    pub integrity_violations: Vec<JobId>,
    pub failures: Vec<JobFailure>,
    /// Dispatcher tick run because capacity was freed.
    pub follow_up: Option<DispatchReport>,
    pub follow_up_error: Option<String>,
}

enum Check {
    Completed,
    Running,
    Violation,
}

pub struct CompletionMonitor {
    jobs: Arc<dyn JobStore>,
    printers: Arc<dyn PrinterRegistry>,
    device: Arc<dyn DeviceClient>,
    dispatcher: Arc<Dispatcher>,
}

impl CompletionMonitor {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        printers: Arc<dyn PrinterRegistry>,
        device: Arc<dyn DeviceClient>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            jobs,
            printers,
            device,
            dispatcher,
        }
    }

    /// Check every InProgress job once, then dispatch if anything finished.
    pub async fn tick(&self) -> Result<CompletionReport, SchedulerError> {
        let tick = Uuid::now_v7();
        self.run_tick(tick)
            .instrument(info_span!("completion_tick", tick = %tick))
            .await
    }

    async fn run_tick(&self, tick: Uuid) -> Result<CompletionReport, SchedulerError> {
        let in_progress = self.jobs.find_by_status(Status::InProgress).await?;
        let mut report = CompletionReport {
            tick,
            jobs_checked: in_progress.len(),
            completed: Vec::new(),
            integrity_violations: Vec::new(),
            failures: Vec::new(),
            follow_up: None,
            follow_up_error: None,
        };

        for job in in_progress {
            let job_id = job.id;
            match self.check_job(&job).await {
                Ok(Check::Completed) => report.completed.push(job_id),
                Ok(Check::Running) => {}
                Ok(Check::Violation) => report.integrity_violations.push(job_id),
                Err(e) => {
                    if matches!(&e, SchedulerError::Store(s) if s.is_conflict()) {
                        warn!(job_id = %job_id, error = %e, "job changed during completion check");
                    } else {
                        error!(job_id = %job_id, error = %e, "failed to check job completion");
                    }
                    report.failures.push(JobFailure {
                        job_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.completed.is_empty() {
            match self.dispatcher.tick().await {
                Ok(dispatch) => report.follow_up = Some(dispatch),
                Err(e) => {
                    error!(error = %e, "follow-up dispatch failed");
                    report.follow_up_error = Some(e.to_string());
                }
            }
        }

        info!(
            checked = report.jobs_checked,
            completed = report.completed.len(),
            violations = report.integrity_violations.len(),
            "completion tick finished"
        );
        Ok(report)
    }

    async fn check_job(&self, job: &Job) -> Result<Check, SchedulerError> {
        if let Some(violation) = job.integrity_violation() {
            error!(job_id = %job.id, violation = %violation, "skipping inconsistent job");
            return Ok(Check::Violation);
        }
        let Some(printer_id) = job.printer_id else {
            return Ok(Check::Violation);
        };

        let Some(printer) = self.printers.find_by_id(printer_id).await? else {
            error!(job_id = %job.id, printer_id = %printer_id, "assigned printer is not registered");
            return Ok(Check::Violation);
        };
        if printer.endpoint().is_none() {
            error!(job_id = %job.id, printer_id = %printer_id, "assigned printer has no address or api key");
            return Ok(Check::Violation);
        }

        let probe = self.device.query_progress(&printer).await;
        if !probe.is_complete() {
            if let ProgressProbe::Reported(progress) = &probe {
                debug!(
                    job_id = %job.id,
                    printer_id = %printer_id,
                    state = %progress.state,
                    percent = ?progress.percent_complete,
                    remaining_secs = ?progress.time_remaining_secs,
                    "job still running"
                );
            }
            return Ok(Check::Running);
        }

        self.jobs.complete(job.id, Utc::now()).await?;
        info!(job_id = %job.id, printer_id = %printer_id, "job awaiting pickup");
        Ok(Check::Completed)
    }
}
