//! Seed data for the in-memory stores.
//!
//! Without a database the registry and queue start empty; a seed file gives
//! the development mode something to schedule:
//!
//! ```json
//! {
//!   "printers": [
//!     { "id": 1, "name": "prusa-1", "location": "lab", "address": "10.0.0.5", "api_key": "KEY" }
//!   ],
//!   "queue": [
//!     { "id": 7, "name": "benchy", "file_ref": "benchy.gcode" }
//!   ]
//! }
//! ```
//!
//! Items in `queue` become Waiting jobs in file order.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use printfarm_printing::{Item, Printer};

use crate::jobs::{JobStore, JobStoreError};
use crate::printers::{InMemoryPrinterRegistry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Seed {
    #[serde(default)]
    pub printers: Vec<Printer>,
    #[serde(default)]
    pub queue: Vec<Item>,
}

/// What [`Seed::apply`] loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub printers: usize,
    pub jobs: usize,
}

impl Seed {
    pub fn from_json(text: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Register the printers, then queue one Waiting job per item.
    pub async fn apply(
        self,
        registry: &InMemoryPrinterRegistry,
        jobs: &dyn JobStore,
    ) -> Result<SeedSummary, SeedError> {
        let summary = SeedSummary {
            printers: self.printers.len(),
            jobs: self.queue.len(),
        };
        for printer in self.printers {
            registry.upsert(printer)?;
        }
        for item in self.queue {
            let job = jobs.insert_waiting(item).await?;
            info!(job_id = %job.id, item_id = %job.item.id, "queued seed job");
        }
        info!(printers = summary.printers, jobs = summary.jobs, "seed data loaded");
        Ok(summary)
    }
}
