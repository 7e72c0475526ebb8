//! Print job record and its lifecycle transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use printfarm_core::{DomainError, DomainResult, ItemId, JobId, PrinterId};

use crate::status::Status;

/// The ordered item a job produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Path of the print file in the device's file store.
    pub file_ref: String,
}

/// A unit of manufacturing work.
///
/// Records are written by the CRUD layer as well as by the scheduler, so a
/// loaded job is not assumed to satisfy the lifecycle invariant; call
/// [`Job::integrity_violation`] before relying on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub item: Item,
    pub printer_id: Option<PrinterId>,
    pub status: Status,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly queued job: no printer, no timestamps.
    pub fn waiting(id: JobId, item: Item) -> Self {
        Self {
            id,
            item,
            printer_id: None,
            status: Status::Waiting,
            started_at: None,
            ended_at: None,
        }
    }

    /// Waiting -> InProgress on `printer_id`.
    pub fn start(&mut self, printer_id: PrinterId, at: DateTime<Utc>) -> DomainResult<()> {
        self.status.ensure_transition(Status::InProgress)?;
        self.printer_id = Some(printer_id);
        self.status = Status::InProgress;
        self.started_at = Some(at);
        Ok(())
    }

    /// InProgress -> AwaitingPickup.
    pub fn finish(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.status.ensure_transition(Status::AwaitingPickup)?;
        if self.printer_id.is_none() {
            return Err(DomainError::invariant(format!(
                "job {} is in progress without a printer",
                self.id
            )));
        }
        self.status = Status::AwaitingPickup;
        self.ended_at = Some(at);
        Ok(())
    }

    /// AwaitingPickup -> Done (pickup confirmed).
    pub fn close(&mut self) -> DomainResult<()> {
        self.status.ensure_transition(Status::Done)?;
        self.status = Status::Done;
        Ok(())
    }

    /// Describe the first broken lifecycle invariant, if any.
    pub fn integrity_violation(&self) -> Option<String> {
        match (self.status.holds_printer(), self.printer_id) {
            (true, None) => Some(format!(
                "job {} is {} but has no assigned printer",
                self.id, self.status
            )),
            (false, Some(printer_id)) => Some(format!(
                "job {} is {} but references printer {}",
                self.id, self.status, printer_id
            )),
            _ => None,
        }
    }
}
