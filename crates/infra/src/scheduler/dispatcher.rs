//! Dispatcher: assigns Waiting jobs to idle printers.
//!
//! One tick:
//! 1. Load Waiting jobs in id order (FIFO)
//! 2. For each job, walk the registry in order; skip printers without an
//!    endpoint or already holding an active job; probe the rest
//! 3. Submit to the first Available printer; on acceptance persist the
//!    assignment and move to the next job
//! 4. Stop once `max_assignments_per_tick` jobs were assigned
//!
//! Jobs nobody accepts stay Waiting for the next tick.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use printfarm_core::{JobId, PrinterId};
use printfarm_printing::{Availability, Job, Status};

use super::{JobFailure, SchedulerError};
use crate::device::DeviceClient;
use crate::jobs::JobStore;
use crate::printers::PrinterRegistry;

/// A persisted assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub job_id: JobId,
    pub printer_id: PrinterId,
}

/// Outcome of one dispatcher tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub tick: Uuid,
    /// Waiting jobs considered before the tick ended.
    pub jobs_examined: usize,
    pub assignments: Vec<Assignment>,
    pub failures: Vec<JobFailure>,
}

impl DispatchReport {
    fn new(tick: Uuid) -> Self {
        Self {
            tick,
            jobs_examined: 0,
            assignments: Vec::new(),
            failures: Vec::new(),
        }
    }
}

pub struct Dispatcher {
    jobs: Arc<dyn JobStore>,
    printers: Arc<dyn PrinterRegistry>,
    device: Arc<dyn DeviceClient>,
    max_assignments_per_tick: usize,
    // Serializes ticks from the dispatch loop and completion follow-ups.
    tick_guard: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        printers: Arc<dyn PrinterRegistry>,
        device: Arc<dyn DeviceClient>,
        max_assignments_per_tick: usize,
    ) -> Self {
        Self {
            jobs,
            printers,
            device,
            max_assignments_per_tick: max_assignments_per_tick.max(1),
            tick_guard: Mutex::new(()),
        }
    }

    /// Run one tick to completion.
    ///
    /// Fails only if the Waiting list cannot be loaded; per-job failures are
    /// reported in [`DispatchReport::failures`].
    pub async fn tick(&self) -> Result<DispatchReport, SchedulerError> {
        let _guard = self.tick_guard.lock().await;
        let tick = Uuid::now_v7();
        self.run_tick(tick)
            .instrument(info_span!("dispatch_tick", tick = %tick))
            .await
    }

    async fn run_tick(&self, tick: Uuid) -> Result<DispatchReport, SchedulerError> {
        let waiting = self.jobs.find_by_status(Status::Waiting).await?;
        let mut report = DispatchReport::new(tick);

        if waiting.is_empty() {
            debug!("no waiting jobs");
            return Ok(report);
        }

        for job in waiting {
            if report.assignments.len() >= self.max_assignments_per_tick {
                break;
            }
            report.jobs_examined += 1;

            let job_id = job.id;
            match self.dispatch_job(job).await {
                Ok(Some(printer_id)) => report.assignments.push(Assignment { job_id, printer_id }),
                Ok(None) => debug!(job_id = %job_id, "no printer accepted job, leaving it waiting"),
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "failed to dispatch job");
                    report.failures.push(JobFailure {
                        job_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            examined = report.jobs_examined,
            assigned = report.assignments.len(),
            failed = report.failures.len(),
            "dispatch tick finished"
        );
        Ok(report)
    }

    /// Try every eligible printer in registry order for one job.
    async fn dispatch_job(&self, job: Job) -> Result<Option<PrinterId>, SchedulerError> {
        // Reloaded per job: an earlier job in this tick may have taken a printer.
        let printers = self.printers.find_all().await?;
        let occupied = self.jobs.occupied_printers().await?;

        for printer in &printers {
            if printer.endpoint().is_none() {
                debug!(printer_id = %printer.id, "printer has no address or api key, skipping");
                continue;
            }
            if occupied.contains(&printer.id) {
                debug!(printer_id = %printer.id, "printer holds an active job, skipping");
                continue;
            }

            let availability = self.device.query_availability(printer).await;
            debug!(printer_id = %printer.id, availability = ?availability, "printer probed");
            if availability != Availability::Available {
                continue;
            }

            if !self.device.submit_job(printer, &job).await {
                warn!(job_id = %job.id, printer_id = %printer.id, "printer rejected job, trying next");
                continue;
            }

            let mut assigned = job.clone();
            assigned.start(printer.id, Utc::now())?;
            if let Err(e) = self.jobs.assign(&assigned).await {
                // The device is already printing; the record still says Waiting.
                warn!(
                    job_id = %job.id,
                    printer_id = %printer.id,
                    error = %e,
                    "printer accepted job but the assignment was not persisted"
                );
                return Err(e.into());
            }

            info!(job_id = %job.id, printer_id = %printer.id, file = %job.item.file_ref, "job assigned");
            return Ok(Some(printer.id));
        }

        Ok(None)
    }
}
