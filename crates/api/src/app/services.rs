use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use printfarm_infra::config::{AppConfig, SchedulerConfig};
use printfarm_infra::db;
use printfarm_infra::device::OctoPrintClient;
use printfarm_infra::jobs::{InMemoryJobStore, JobStore, PostgresJobStore};
use printfarm_infra::printers::{InMemoryPrinterRegistry, PostgresPrinterRegistry, PrinterRegistry};
use printfarm_infra::scheduler::{DispatchTrigger, Scheduler, SchedulerHandle, StatsHandle};
use printfarm_infra::seed::Seed;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppServices {
    pub jobs: Arc<dyn JobStore>,
    pub stats: StatsHandle,
    pub dispatch: DispatchTrigger,
}

/// Job store and printer registry selected by configuration.
#[derive(Clone)]
pub struct Backends {
    pub jobs: Arc<dyn JobStore>,
    pub printers: Arc<dyn PrinterRegistry>,
}

impl Backends {
    /// In-memory stores, populated from `seed` when given.
    pub async fn in_memory(seed: Option<Seed>) -> anyhow::Result<Self> {
        let jobs = Arc::new(InMemoryJobStore::new());
        let printers = Arc::new(InMemoryPrinterRegistry::new());
        match seed {
            Some(seed) => {
                seed.apply(&printers, jobs.as_ref())
                    .await
                    .context("failed to apply seed data")?;
            }
            None => warn!("no SEED_FILE given; in-memory registry and queue start empty"),
        }
        Ok(Self { jobs, printers })
    }
}

/// Postgres when `DATABASE_URL` is set, in-memory otherwise.
pub async fn build_backends(config: &AppConfig) -> anyhow::Result<Backends> {
    match &config.database_url {
        Some(url) => {
            let pool = db::connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            info!("using postgres job store and printer registry");
            if config.seed_file.is_some() {
                warn!("SEED_FILE is ignored when DATABASE_URL is set");
            }
            Ok(Backends {
                jobs: Arc::new(PostgresJobStore::new(pool.clone())),
                printers: Arc::new(PostgresPrinterRegistry::new(pool)),
            })
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory stores (state is lost on exit)");
            let seed = config
                .seed_file
                .as_ref()
                .map(Seed::from_file)
                .transpose()
                .context("failed to load SEED_FILE")?;
            Backends::in_memory(seed).await
        }
    }
}

/// Spawn the scheduler loops over `backends` with the OctoPrint client.
pub fn start_scheduler(
    config: &SchedulerConfig,
    backends: &Backends,
) -> anyhow::Result<(AppServices, SchedulerHandle)> {
    let device = OctoPrintClient::new(config.device_timeout)
        .context("failed to build device http client")?;
    let handle = Scheduler::new(
        config,
        backends.jobs.clone(),
        backends.printers.clone(),
        Arc::new(device),
    )
    .spawn();

    let services = AppServices {
        jobs: backends.jobs.clone(),
        stats: handle.stats(),
        dispatch: handle.dispatch_trigger(),
    };
    Ok((services, handle))
}
