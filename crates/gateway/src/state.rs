use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use pb_catalog::DeviceCatalog;
use pb_domain::config::Config;
use pb_protocol::{ProtocolClient, Timeouts};

use crate::runtime::reconcile::Reconciler;
use crate::runtime::scheduler::SchedulerStatus;

/// Shared application state passed to all API handlers.
///
/// Built once by [`crate::bootstrap::build_app_state`]; every component
/// receives the catalog and protocol client from here.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub catalog: Arc<DeviceCatalog>,
    pub client: Arc<dyn ProtocolClient>,
    pub timeouts: Timeouts,

    // ── Runtime ───────────────────────────────────────────────────────
    /// Bounds concurrent registrations.
    pub registrations: Arc<Semaphore>,
    pub scheduler: SchedulerStatus,
    /// Cancelled on shutdown; stops the scheduler and the HTTP server.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.catalog.clone(), self.client.clone(), self.timeouts)
    }
}
