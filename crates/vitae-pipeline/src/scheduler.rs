//! Periodic driver for a manager.

use crate::error::{PipelineError, PipelineResult};
use crate::manager::{Manager, TickOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Calls `Manager::tick` on a fixed interval until stopped.
///
/// Ticks run one after another inside a single task, so they never overlap.
/// Stopping waits for an in-flight tick to finish rather than interrupting it.
pub struct Scheduler {
    manager: Arc<Manager>,
    running: Option<RunningLoop>,
    ticks: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self {
            manager,
            running: None,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self.running {
            Some(_) => SchedulerState::Running,
            None => SchedulerState::Stopped,
        }
    }

    /// Number of ticks completed since construction.
    pub fn ticks_completed(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Start ticking. The first tick runs immediately. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self, interval: Duration) -> PipelineResult<()> {
        if self.running.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.manager.clone(),
            interval,
            cancel.clone(),
            self.ticks.clone(),
        ));

        info!(
            "{} scheduler started (every {}s)",
            self.manager.policy().stage(),
            interval.as_secs_f64()
        );
        self.running = Some(RunningLoop { cancel, handle });
        Ok(())
    }

    /// Stop ticking and wait for the loop to exit. Stopping a stopped
    /// scheduler does nothing.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::error!("Scheduler loop ended abnormally: {}", e);
        }
        info!("{} scheduler stopped", self.manager.policy().stage());
    }
}

async fn run_loop(
    manager: Arc<Manager>,
    interval: Duration,
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
) {
    while !cancel.is_cancelled() {
        let outcome = manager.tick().await;
        ticks.fetch_add(1, Ordering::SeqCst);
        if let TickOutcome::Worked(work) = &outcome {
            debug!("Tick finished: {:?}", work);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
