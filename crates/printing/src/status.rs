//! Job status lookup.
//!
//! Stored as a foreign key into the `status` table so the CRUD layer can show a
//! human label; the ids below are the stable identities of those rows.

use serde::{Deserialize, Serialize};

use printfarm_core::{DomainError, DomainResult};

/// Lifecycle status of a print job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Queued, unassigned.
    Waiting,
    /// Assigned to a printer and printing.
    InProgress,
    /// Finished printing, not yet collected.
    AwaitingPickup,
    /// Collected/closed. Terminal.
    Done,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Waiting,
        Status::InProgress,
        Status::AwaitingPickup,
        Status::Done,
    ];

    /// Stable row id in the `status` lookup table.
    pub const fn id(self) -> i64 {
        match self {
            Status::Waiting => 1,
            Status::InProgress => 2,
            Status::AwaitingPickup => 3,
            Status::Done => 4,
        }
    }

    /// Human label as stored in the lookup table.
    pub const fn label(self) -> &'static str {
        match self {
            Status::Waiting => "Waiting",
            Status::InProgress => "In Progress",
            Status::AwaitingPickup => "Awaiting Pick Up",
            Status::Done => "Done",
        }
    }

    pub fn from_id(id: i64) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| DomainError::validation(format!("unknown status id {id}")))
    }

    /// Whether a job in this status must reference a printer.
    pub const fn holds_printer(self) -> bool {
        !matches!(self, Status::Waiting)
    }

    /// Whether a job in this status occupies its printer (blocks new dispatch).
    pub const fn occupies_printer(self) -> bool {
        matches!(self, Status::InProgress | Status::AwaitingPickup)
    }

    /// The only status this one may move to, if any.
    pub const fn next(self) -> Option<Status> {
        match self {
            Status::Waiting => Some(Status::InProgress),
            Status::InProgress => Some(Status::AwaitingPickup),
            Status::AwaitingPickup => Some(Status::Done),
            Status::Done => None,
        }
    }

    /// Reject anything other than the single forward step.
    pub fn ensure_transition(self, to: Status) -> DomainResult<()> {
        if self.next() == Some(to) {
            Ok(())
        } else {
            Err(DomainError::invariant(format!(
                "illegal status transition {} -> {}",
                self.label(),
                to.label()
            )))
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
