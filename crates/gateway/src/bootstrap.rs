//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! `serve` and the one-shot `devices` commands share [`build_app_state`] so
//! they see the same catalog and protocol backend.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pb_catalog::DeviceCatalog;
use pb_domain::config::{Config, ConfigSeverity, ProtocolBackend, ProtocolConfig};
use pb_protocol::{AddressSpace, ProtocolClient, SimulatedClient, Timeouts};

use crate::runtime::scheduler::{self, PollingScheduler, SchedulerStatus};
use crate::state::AppState;

/// Validate config, open the catalog, build the protocol backend and return
/// a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Device catalog ───────────────────────────────────────────────
    let catalog = Arc::new(
        DeviceCatalog::open(&config.catalog.path)
            .with_context(|| format!("opening catalog at {}", config.catalog.path.display()))?,
    );
    tracing::info!(
        path = %config.catalog.path.display(),
        devices = catalog.count_devices().unwrap_or(0),
        "device catalog ready"
    );

    // ── Protocol backend ─────────────────────────────────────────────
    let client = build_protocol_client(&config.protocol)?;
    let timeouts = Timeouts::from_config(&config.protocol);

    Ok(with_parts(config, catalog, client, timeouts))
}

/// Assemble an [`AppState`] from already-built parts.
pub fn with_parts(
    config: Arc<Config>,
    catalog: Arc<DeviceCatalog>,
    client: Arc<dyn ProtocolClient>,
    timeouts: Timeouts,
) -> AppState {
    let registrations = Arc::new(Semaphore::new(
        config.protocol.max_concurrent_registrations.max(1),
    ));
    AppState {
        config,
        catalog,
        client,
        timeouts,
        registrations,
        scheduler: SchedulerStatus::new(),
        shutdown: CancellationToken::new(),
    }
}

pub fn build_protocol_client(config: &ProtocolConfig) -> anyhow::Result<Arc<dyn ProtocolClient>> {
    match config.backend {
        ProtocolBackend::Simulated => {
            let path = &config.address_space;
            let space = if path.exists() {
                AddressSpace::load(path)
                    .with_context(|| format!("loading address space {}", path.display()))?
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "address space fixture not found, every device will be unreachable"
                );
                AddressSpace::default()
            };
            tracing::info!(servers = space.servers.len(), "simulated protocol backend ready");
            Ok(Arc::new(SimulatedClient::new(space)))
        }
    }
}

/// Handles to the long-running background tasks.
pub struct BackgroundTasks {
    scheduler: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    /// Cancel every task and wait for it to finish its current unit of work.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Some(handle) = self.scheduler {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "polling scheduler task failed");
            }
        }
        tracing::info!("background tasks stopped");
    }
}

/// Spawn the long-running background tokio tasks (currently the polling
/// scheduler).
///
/// Call this **after** [`build_app_state`] when running the HTTP server.
/// CLI one-shot commands skip this.
pub fn spawn_background_tasks(state: &AppState) -> BackgroundTasks {
    let scheduler = if state.config.polling.enabled {
        let polling = PollingScheduler::new(
            state.catalog.clone(),
            state.reconciler(),
            state.config.polling.interval(),
            state.scheduler.clone(),
        );
        Some(scheduler::spawn(polling, state.shutdown.child_token()))
    } else {
        tracing::info!("polling disabled ([polling] enabled = false)");
        None
    };
    tracing::info!("background tasks spawned");

    BackgroundTasks {
        scheduler,
        shutdown: state.shutdown.clone(),
    }
}
