//! Background polling scheduler: sleep, then reconcile every device that
//! has a heartbeat point, one device at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pb_catalog::DeviceCatalog;
use pb_domain::trace::TraceEvent;

use crate::runtime::reconcile::Reconciler;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Cancelling,
    Stopped,
}

/// Shared, observable scheduler state.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    inner: Arc<RwLock<SchedulerState>>,
}

impl SchedulerStatus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SchedulerState::Idle)),
        }
    }

    pub fn get(&self) -> SchedulerState {
        *self.inner.read()
    }

    fn set(&self, next: SchedulerState) {
        let mut state = self.inner.write();
        if *state != next {
            tracing::debug!(from = ?*state, to = ?next, "scheduler state change");
            *state = next;
        }
    }
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub devices: usize,
    pub reconciled: usize,
    pub failed: usize,
    /// Devices left unchecked because cancellation arrived mid-sweep.
    pub discarded: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PollingScheduler {
    catalog: Arc<DeviceCatalog>,
    reconciler: Reconciler,
    interval: Duration,
    status: SchedulerStatus,
}

impl PollingScheduler {
    pub fn new(
        catalog: Arc<DeviceCatalog>,
        reconciler: Reconciler,
        interval: Duration,
        status: SchedulerStatus,
    ) -> Self {
        Self {
            catalog,
            reconciler,
            interval,
            status,
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.clone()
    }

    /// Run until `cancel` fires. Cancellation is a normal exit.
    pub async fn run(self, cancel: CancellationToken) {
        self.status.set(SchedulerState::Running);
        tracing::info!(interval_sec = self.interval.as_secs(), "polling scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep(&cancel).await;
                    if cancel.is_cancelled() {
                        break;
                    }
                }
            }
        }

        self.status.set(SchedulerState::Cancelling);
        tracing::info!("polling scheduler stopping");
        self.status.set(SchedulerState::Stopped);
    }

    /// Reconcile every heartbeat device once. Cancellation is observed
    /// between devices; the device in flight always completes.
    pub async fn sweep(&self, cancel: &CancellationToken) -> SweepSummary {
        let started = Instant::now();
        let targets = match pb_catalog::blocking(&self.catalog, |c| c.list_devices_with_heartbeat()).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!(error = %e, "cannot list devices for polling, skipping sweep");
                return SweepSummary::default();
            }
        };

        let mut summary = SweepSummary {
            devices: targets.len(),
            ..SweepSummary::default()
        };

        for (index, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.discarded = targets.len() - index;
                self.status.set(SchedulerState::Cancelling);
                tracing::info!(discarded = summary.discarded, "sweep cancelled, discarding remaining devices");
                break;
            }

            let reconciler = self.reconciler.clone();
            let job = target.clone();
            let handle = tokio::spawn(async move { reconciler.reconcile(&job).await });

            match handle.await {
                Ok(Ok(_)) => summary.reconciled += 1,
                Ok(Err(e)) if e.is_not_found() => {
                    tracing::debug!(device_no = target.device_no, "device removed during sweep");
                }
                Ok(Err(e)) => {
                    tracing::error!(device_no = target.device_no, error = %e, "failed to record device status");
                    summary.failed += 1;
                }
                Err(join_err) => {
                    tracing::error!(
                        device_no = target.device_no,
                        error = %join_err,
                        "reconciliation task aborted, marking device disconnected"
                    );
                    if let Err(e) = self.reconciler.record_disconnected(target.device_no).await {
                        tracing::warn!(device_no = target.device_no, error = %e, "could not record fallback status");
                    }
                    summary.failed += 1;
                }
            }
        }

        TraceEvent::SweepCompleted {
            devices: summary.devices,
            reconciled: summary.reconciled,
            failed: summary.failed,
            discarded: summary.discarded,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        summary
    }
}

/// Spawn the scheduler as a supervised background task.
pub fn spawn(scheduler: PollingScheduler, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(scheduler.run(cancel))
}
