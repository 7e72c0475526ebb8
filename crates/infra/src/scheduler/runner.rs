//! Tokio runner for the dispatcher and completion monitor loops.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{CompletionMonitor, CompletionReport, DispatchReport, Dispatcher, SchedulerError};
use crate::config::SchedulerConfig;
use crate::device::DeviceClient;
use crate::jobs::JobStore;
use crate::printers::PrinterRegistry;

/// Cumulative counters and the latest tick reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub dispatch_ticks: u64,
    pub dispatch_tick_failures: u64,
    pub jobs_assigned: u64,
    pub completion_ticks: u64,
    pub completion_tick_failures: u64,
    pub jobs_completed: u64,
    pub integrity_violations: u64,
    pub last_dispatch: Option<DispatchReport>,
    pub last_completion: Option<CompletionReport>,
}

/// Shared, read-mostly view of [`SchedulerStats`].
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<SchedulerStats>>,
}

impl StatsHandle {
    pub fn snapshot(&self) -> SchedulerStats {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerStats> {
        // Stats are plain counters; a panic mid-update leaves them usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_dispatch(&self, result: &Result<DispatchReport, SchedulerError>) {
        let mut stats = self.lock();
        stats.dispatch_ticks += 1;
        match result {
            Ok(report) => {
                stats.jobs_assigned += report.assignments.len() as u64;
                stats.last_dispatch = Some(report.clone());
            }
            Err(_) => stats.dispatch_tick_failures += 1,
        }
    }

    fn record_completion(&self, result: &Result<CompletionReport, SchedulerError>) {
        let mut stats = self.lock();
        stats.completion_ticks += 1;
        match result {
            Ok(report) => {
                stats.jobs_completed += report.completed.len() as u64;
                stats.integrity_violations += report.integrity_violations.len() as u64;
                if let Some(follow_up) = &report.follow_up {
                    stats.jobs_assigned += follow_up.assignments.len() as u64;
                    stats.last_dispatch = Some(follow_up.clone());
                }
                stats.last_completion = Some(report.clone());
            }
            Err(_) => stats.completion_tick_failures += 1,
        }
    }
}

/// Both scheduling tasks, ready to spawn.
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    monitor: Arc<CompletionMonitor>,
    dispatch_interval: Duration,
    completion_interval: Duration,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        jobs: Arc<dyn JobStore>,
        printers: Arc<dyn PrinterRegistry>,
        device: Arc<dyn DeviceClient>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            jobs.clone(),
            printers.clone(),
            device.clone(),
            config.max_assignments_per_tick,
        ));
        let monitor = Arc::new(CompletionMonitor::new(jobs, printers, device, dispatcher.clone()));
        Self {
            dispatcher,
            monitor,
            dispatch_interval: config.dispatch_interval,
            completion_interval: config.completion_interval,
        }
    }

    /// Start both loops on the current tokio runtime.
    ///
    /// Each loop ticks immediately, then every interval. A tick always runs to
    /// completion; ticks missed meanwhile are delayed, not stacked.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // Coalesce: capacity 1, extra triggers are dropped.
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
        let stats = StatsHandle::default();

        let dispatch = tokio::spawn(dispatch_loop(
            self.dispatcher,
            self.dispatch_interval,
            stats.clone(),
            shutdown_rx.clone(),
            trigger_rx,
        ));
        let completion = tokio::spawn(completion_loop(
            self.monitor,
            self.completion_interval,
            stats.clone(),
            shutdown_rx,
        ));

        SchedulerHandle {
            shutdown: shutdown_tx,
            trigger: DispatchTrigger { tx: trigger_tx },
            stats,
            tasks: vec![dispatch, completion],
        }
    }
}

/// Clonable hook requesting an out-of-band dispatcher tick.
#[derive(Debug, Clone)]
pub struct DispatchTrigger {
    tx: mpsc::Sender<()>,
}

impl DispatchTrigger {
    /// No-op if a tick is already pending or the scheduler has stopped.
    pub fn fire(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Handle for the running scheduler (shutdown + trigger hook).
///
/// Dropping the handle stops both loops after their current tick.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    trigger: DispatchTrigger,
    stats: StatsHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request an out-of-band dispatcher tick (e.g. after a pickup freed a
    /// printer). Triggers are coalesced.
    pub fn trigger_dispatch(&self) {
        self.trigger.fire();
    }

    pub fn dispatch_trigger(&self) -> DispatchTrigger {
        self.trigger.clone()
    }

    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Let in-flight ticks finish, then stop both loops.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }
    }
}

async fn dispatch_loop(
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    stats: StatsHandle,
    mut shutdown: watch::Receiver<bool>,
    mut trigger: mpsc::Receiver<()>,
) {
    info!(interval_secs = interval.as_secs(), "dispatcher started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
            Some(()) = trigger.recv() => {}
        }

        let result = dispatcher.tick().await;
        if let Err(e) = &result {
            warn!(error = %e, "dispatcher tick failed");
        }
        stats.record_dispatch(&result);
    }

    info!("dispatcher stopped");
}

async fn completion_loop(
    monitor: Arc<CompletionMonitor>,
    interval: Duration,
    stats: StatsHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "completion monitor started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let result = monitor.tick().await;
        if let Err(e) = &result {
            warn!(error = %e, "completion tick failed");
        }
        stats.record_completion(&result);
    }

    info!("completion monitor stopped");
}
