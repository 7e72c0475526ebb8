//! Job store contract and in-memory implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use printfarm_core::{DomainError, JobId, PrinterId};
use printfarm_printing::{Item, Job, Status};

/// Job store abstraction.
///
/// All listing methods return jobs in ascending id order (queue order).
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// List jobs in a given status.
    async fn find_by_status(&self, status: Status) -> Result<Vec<Job>, JobStoreError>;

    /// Get a job by ID.
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError>;

    async fn exists_by_id(&self, id: JobId) -> Result<bool, JobStoreError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    /// Unconditionally overwrite an existing job.
    async fn save(&self, job: &Job) -> Result<Job, JobStoreError>;

    /// Queue a new job for `item` (Waiting, no printer, no timestamps).
    async fn insert_waiting(&self, item: Item) -> Result<Job, JobStoreError>;

    /// Write `job` only if the stored status still equals `expected`.
    async fn update_if_status(&self, job: &Job, expected: Status) -> Result<Job, JobStoreError>;

    /// Persist a Waiting -> InProgress transition already applied to `job`.
    ///
    /// Succeeds only if the stored job is still Waiting and no other job
    /// occupies the target printer.
    async fn assign(&self, job: &Job) -> Result<Job, JobStoreError>;

    /// Printers currently holding an InProgress or AwaitingPickup job.
    async fn occupied_printers(&self) -> Result<HashSet<PrinterId>, JobStoreError> {
        let mut occupied = HashSet::new();
        for status in [Status::InProgress, Status::AwaitingPickup] {
            for job in self.find_by_status(status).await? {
                if let Some(printer_id) = job.printer_id {
                    occupied.insert(printer_id);
                }
            }
        }
        Ok(occupied)
    }

    /// InProgress -> AwaitingPickup, stamping the end time.
    async fn complete(&self, id: JobId, ended_at: DateTime<Utc>) -> Result<Job, JobStoreError> {
        let mut job = self
            .find_by_id(id)
            .await?
            .ok_or(JobStoreError::NotFound(id))?;
        job.finish(ended_at)?;
        self.update_if_status(&job, Status::InProgress).await
    }

    /// AwaitingPickup -> Done (pickup confirmed).
    async fn mark_done(&self, id: JobId) -> Result<Job, JobStoreError> {
        let mut job = self
            .find_by_id(id)
            .await?
            .ok_or(JobStoreError::NotFound(id))?;
        job.close()?;
        self.update_if_status(&job, Status::AwaitingPickup).await
    }
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("conditional update rejected: {0}")]
    Conflict(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl JobStoreError {
    pub fn is_conflict(&self) -> bool {
        match self {
            JobStoreError::Conflict(_) => true,
            JobStoreError::Domain(DomainError::InvariantViolation(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    jobs: BTreeMap<JobId, Job>,
    last_id: i64,
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<Inner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed a job with an explicit id and state (bypasses lifecycle checks).
    pub fn insert(&self, job: Job) -> Result<(), JobStoreError> {
        let mut inner = self.write()?;
        inner.last_id = inner.last_id.max(job.id.get());
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, JobStoreError> {
        self.inner
            .read()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, JobStoreError> {
        self.inner
            .write()
            .map_err(|_| JobStoreError::Storage("job store lock poisoned".to_string()))
    }
}

fn printer_occupied_by_other(inner: &Inner, printer_id: PrinterId, job_id: JobId) -> bool {
    inner.jobs.values().any(|j| {
        j.id != job_id && j.printer_id == Some(printer_id) && j.status.occupies_printer()
    })
}

#[async_trait::async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_by_status(&self, status: Status) -> Result<Vec<Job>, JobStoreError> {
        let inner = self.read()?;
        // BTreeMap iteration is already id-ascending.
        Ok(inner
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.read()?.jobs.get(&id).cloned())
    }

    async fn save(&self, job: &Job) -> Result<Job, JobStoreError> {
        let mut inner = self.write()?;
        let slot = inner
            .jobs
            .get_mut(&job.id)
            .ok_or(JobStoreError::NotFound(job.id))?;
        *slot = job.clone();
        Ok(job.clone())
    }

    async fn insert_waiting(&self, item: Item) -> Result<Job, JobStoreError> {
        let mut inner = self.write()?;
        inner.last_id += 1;
        let job = Job::waiting(JobId::new(inner.last_id), item);
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_if_status(&self, job: &Job, expected: Status) -> Result<Job, JobStoreError> {
        let mut inner = self.write()?;
        let slot = inner
            .jobs
            .get_mut(&job.id)
            .ok_or(JobStoreError::NotFound(job.id))?;
        if slot.status != expected {
            return Err(JobStoreError::Conflict(format!(
                "job {} is {}, expected {}",
                job.id, slot.status, expected
            )));
        }
        *slot = job.clone();
        Ok(job.clone())
    }

    async fn assign(&self, job: &Job) -> Result<Job, JobStoreError> {
        let printer_id = match (job.status, job.printer_id) {
            (Status::InProgress, Some(p)) => p,
            _ => {
                return Err(DomainError::invariant(format!(
                    "job {} must be in progress with a printer to be assigned",
                    job.id
                ))
                .into());
            }
        };

        let mut inner = self.write()?;
        if printer_occupied_by_other(&inner, printer_id, job.id) {
            return Err(JobStoreError::Conflict(format!(
                "printer {printer_id} already holds an active job"
            )));
        }
        let slot = inner
            .jobs
            .get_mut(&job.id)
            .ok_or(JobStoreError::NotFound(job.id))?;
        if slot.status != Status::Waiting {
            return Err(JobStoreError::Conflict(format!(
                "job {} is {}, expected {}",
                job.id,
                slot.status,
                Status::Waiting
            )));
        }
        *slot = job.clone();
        Ok(job.clone())
    }
}
