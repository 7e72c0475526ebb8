//! Scripted collaborators for scheduler tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use printfarm_core::{ItemId, JobId, PrinterId};
use printfarm_printing::{Availability, Item, Job, JobProgress, Printer, ProgressProbe, Status};

use crate::device::DeviceClient;
use crate::jobs::{InMemoryJobStore, JobStore, JobStoreError};

/// Device double: per-printer scripted answers plus a call log.
///
/// Unscripted printers are unreachable.
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    availability: Mutex<HashMap<PrinterId, Availability>>,
    rejecting: Mutex<HashSet<PrinterId>>,
    progress: Mutex<HashMap<PrinterId, ProgressProbe>>,
    probes: Mutex<Vec<PrinterId>>,
    submits: Mutex<Vec<(PrinterId, JobId)>>,
}

impl ScriptedDevice {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_availability(&self, printer: i64, availability: Availability) {
        self.availability
            .lock()
            .unwrap()
            .insert(PrinterId::new(printer), availability);
    }

    pub fn reject_submits(&self, printer: i64) {
        self.rejecting.lock().unwrap().insert(PrinterId::new(printer));
    }

    pub fn set_progress(&self, printer: i64, percent: f64, remaining: i64) {
        self.progress.lock().unwrap().insert(
            PrinterId::new(printer),
            ProgressProbe::Reported(JobProgress {
                state: if percent >= 100.0 { "Operational" } else { "Printing" }.to_string(),
                percent_complete: Some(percent),
                time_remaining_secs: Some(remaining),
            }),
        );
    }

    pub fn set_raw_progress(&self, printer: i64, probe: ProgressProbe) {
        self.progress.lock().unwrap().insert(PrinterId::new(printer), probe);
    }

    pub fn probed(&self) -> Vec<i64> {
        self.probes.lock().unwrap().iter().map(|p| p.get()).collect()
    }

    pub fn submitted(&self) -> Vec<(i64, i64)> {
        self.submits
            .lock()
            .unwrap()
            .iter()
            .map(|(p, j)| (p.get(), j.get()))
            .collect()
    }
}

#[async_trait::async_trait]
impl DeviceClient for ScriptedDevice {
    async fn query_availability(&self, printer: &Printer) -> Availability {
        self.probes.lock().unwrap().push(printer.id);
        self.availability
            .lock()
            .unwrap()
            .get(&printer.id)
            .copied()
            .unwrap_or(Availability::Unreachable)
    }

    async fn submit_job(&self, printer: &Printer, job: &Job) -> bool {
        self.submits.lock().unwrap().push((printer.id, job.id));
        !self.rejecting.lock().unwrap().contains(&printer.id)
    }

    async fn query_progress(&self, printer: &Printer) -> ProgressProbe {
        self.progress
            .lock()
            .unwrap()
            .get(&printer.id)
            .cloned()
            .unwrap_or(ProgressProbe::Unreachable)
    }
}

/// Job store whose writes fail for selected jobs, and whose listing can be
/// switched off entirely.
#[derive(Debug, Default)]
pub struct FlakyJobStore {
    pub inner: InMemoryJobStore,
    failing_writes: Mutex<HashSet<JobId>>,
    failing_reads: Mutex<bool>,
}

impl FlakyJobStore {
    pub fn fail_writes_for(&self, job: i64) {
        self.failing_writes.lock().unwrap().insert(JobId::new(job));
    }

    pub fn fail_listing(&self) {
        *self.failing_reads.lock().unwrap() = true;
    }

    fn check_write(&self, id: JobId) -> Result<(), JobStoreError> {
        if self.failing_writes.lock().unwrap().contains(&id) {
            return Err(JobStoreError::Storage(format!("injected write failure for job {id}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobStore for FlakyJobStore {
    async fn find_by_status(&self, status: Status) -> Result<Vec<Job>, JobStoreError> {
        if *self.failing_reads.lock().unwrap() {
            return Err(JobStoreError::Storage("injected read failure".to_string()));
        }
        self.inner.find_by_status(status).await
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, job: &Job) -> Result<Job, JobStoreError> {
        self.check_write(job.id)?;
        self.inner.save(job).await
    }

    async fn insert_waiting(&self, item: Item) -> Result<Job, JobStoreError> {
        self.inner.insert_waiting(item).await
    }

    async fn update_if_status(&self, job: &Job, expected: Status) -> Result<Job, JobStoreError> {
        self.check_write(job.id)?;
        self.inner.update_if_status(job, expected).await
    }

    async fn assign(&self, job: &Job) -> Result<Job, JobStoreError> {
        self.check_write(job.id)?;
        self.inner.assign(job).await
    }
}

pub fn printer(id: i64) -> Printer {
    Printer {
        id: PrinterId::new(id),
        name: format!("printer-{id}"),
        location: Some("lab".to_string()),
        address: Some(format!("10.0.0.{id}")),
        api_key: Some(format!("key-{id}")),
    }
}

pub fn item(id: i64) -> Item {
    Item {
        id: ItemId::new(id),
        name: format!("item-{id}"),
        file_ref: format!("item-{id}.gcode"),
    }
}

pub fn waiting_job(id: i64) -> Job {
    Job::waiting(JobId::new(id), item(id))
}

pub fn in_progress_job(id: i64, printer: i64) -> Job {
    let mut job = waiting_job(id);
    job.printer_id = Some(PrinterId::new(printer));
    job.status = Status::InProgress;
    job.started_at = Some(chrono::Utc::now());
    job
}

pub async fn status_of(store: &dyn JobStore, id: i64) -> (Status, Option<i64>) {
    let job = store.find_by_id(JobId::new(id)).await.unwrap().unwrap();
    (job.status, job.printer_id.map(PrinterId::get))
}
