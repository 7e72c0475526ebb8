use chrono::{DateTime, Utc};
use serde::Serialize;

use printfarm_core::{ItemId, JobId, PrinterId};
use printfarm_printing::{Job, Status};

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: JobId,
    pub item_id: ItemId,
    pub item_name: String,
    pub printer_id: Option<PrinterId>,
    pub status: Status,
    pub status_label: &'static str,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            item_id: job.item.id,
            item_name: job.item.name,
            printer_id: job.printer_id,
            status: job.status,
            status_label: job.status.label(),
            started_at: job.started_at,
            ended_at: job.ended_at,
        }
    }
}
