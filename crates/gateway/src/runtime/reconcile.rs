//! Status reconciliation for one device.
//!
//! Link status answers "can a session be opened?"; liveness answers "does
//! the controller report itself running?". Both are recomputed from
//! scratch on every check and always written back together.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use pb_catalog::DeviceCatalog;
use pb_domain::trace::TraceEvent;
use pb_domain::{LinkState, PollTarget, StatusPair};
use pb_protocol::{open_session, ProtocolClient, SessionGuard, Timeouts};

/// Outcome of one reconciliation that reached the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub device_no: u32,
    pub status: StatusPair,
    pub previous: StatusPair,
    pub checked_at: DateTime<Utc>,
}

impl Reconciled {
    pub fn changed(&self) -> bool {
        self.status != self.previous
    }
}

/// Read the heartbeat point once. Any fault counts as not running.
pub async fn read_liveness(session: &SessionGuard, heartbeat_id: &str) -> LinkState {
    match session.read_value(heartbeat_id).await {
        Ok(value) => LinkState::from_bool(value.is_truthy()),
        Err(fault) => {
            tracing::warn!(
                address = %session.address(),
                heartbeat = %heartbeat_id,
                error = %fault,
                "heartbeat read failed, treating controller as not running"
            );
            LinkState::Disconnected
        }
    }
}

/// Recompute the status pair of a device without touching the catalog.
/// Never fails: an unreachable device is fully disconnected.
pub async fn assess(
    client: &dyn ProtocolClient,
    timeouts: Timeouts,
    address: &str,
    heartbeat_id: Option<&str>,
) -> StatusPair {
    let session = match open_session(client, address, timeouts).await {
        Ok(session) => session,
        Err(fault) => {
            tracing::debug!(address = %address, error = %fault, "device unreachable");
            return StatusPair::disconnected();
        }
    };

    let liveness = match heartbeat_id {
        Some(id) => read_liveness(&session, id).await,
        None => LinkState::Disconnected,
    };
    session.close().await;

    StatusPair::new(LinkState::Connected, liveness)
}

/// Assesses devices and writes their status pair back to the catalog.
#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<DeviceCatalog>,
    client: Arc<dyn ProtocolClient>,
    timeouts: Timeouts,
}

impl Reconciler {
    pub fn new(catalog: Arc<DeviceCatalog>, client: Arc<dyn ProtocolClient>, timeouts: Timeouts) -> Self {
        Self {
            catalog,
            client,
            timeouts,
        }
    }

    /// Assess `target` and persist the result, even when nothing changed,
    /// so `last_checked_at` always advances.
    pub async fn reconcile(&self, target: &PollTarget) -> pb_domain::Result<Reconciled> {
        let status = assess(
            self.client.as_ref(),
            self.timeouts,
            &target.address,
            target.heartbeat(),
        )
        .await;
        self.record(target.device_no, status).await
    }

    /// Persist `status` for a device that could not be assessed at all.
    pub async fn record_disconnected(&self, device_no: u32) -> pb_domain::Result<Reconciled> {
        self.record(device_no, StatusPair::disconnected()).await
    }

    async fn record(&self, device_no: u32, status: StatusPair) -> pb_domain::Result<Reconciled> {
        let checked_at = Utc::now();
        let previous = pb_catalog::blocking(&self.catalog, move |c| {
            c.update_status(device_no, status, checked_at)
        })
        .await?;
        let outcome = Reconciled {
            device_no,
            status,
            previous,
            checked_at,
        };

        if outcome.changed() {
            TraceEvent::StatusChanged {
                device_no,
                link_status: status.link,
                liveness_status: status.liveness,
                previous_link_status: previous.link,
                previous_liveness_status: previous.liveness,
            }
            .emit();
        }
        tracing::debug!(
            device_no,
            link = %status.link,
            liveness = %status.liveness,
            "device reconciled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_domain::Device;
    use pb_protocol::{AddressSpace, PointValue, SimNode, SimServer, SimulatedClient};

    const PLC: &str = "opc.tcp://10.0.0.3:4840";
    const HEARTBEAT: &str = "ns=2;s=P3_running";

    fn setup(running: PointValue) -> (Arc<DeviceCatalog>, Arc<SimulatedClient>, Reconciler) {
        let catalog = Arc::new(DeviceCatalog::open_in_memory().unwrap());
        let mut device = Device::new(3, PLC);
        device.heartbeat_point_id = HEARTBEAT.into();
        catalog.upsert_device(&device).unwrap();

        let client = Arc::new(SimulatedClient::new(AddressSpace {
            servers: vec![SimServer::new(PLC, vec![SimNode::variable("P3_running", running)])],
        }));
        let reconciler = Reconciler::new(catalog.clone(), client.clone(), Timeouts::default());
        (catalog, client, reconciler)
    }

    fn target() -> PollTarget {
        PollTarget {
            device_no: 3,
            address: PLC.into(),
            heartbeat_point_id: HEARTBEAT.into(),
        }
    }

    #[tokio::test]
    async fn running_controller_is_fully_connected() {
        let (catalog, client, reconciler) = setup(PointValue::Bool(true));
        let outcome = reconciler.reconcile(&target()).await.unwrap();

        assert!(outcome.status.combined_connected());
        assert!(outcome.changed());
        assert!(catalog.get_device(3).unwrap().status().combined_connected());
        assert_eq!(client.open_sessions(), 0);
    }

    #[tokio::test]
    async fn stopped_controller_keeps_link_but_loses_liveness() {
        let (_catalog, _client, reconciler) = setup(PointValue::Int(0));
        let outcome = reconciler.reconcile(&target()).await.unwrap();
        assert_eq!(
            outcome.status,
            StatusPair::new(LinkState::Connected, LinkState::Disconnected)
        );
    }

    #[tokio::test]
    async fn unreachable_device_is_disconnected_and_timestamp_advances() {
        let (catalog, client, reconciler) = setup(PointValue::Bool(true));
        reconciler.reconcile(&target()).await.unwrap();
        let first = catalog.get_device(3).unwrap().last_checked_at.unwrap();

        client.set_refuse(PLC, true);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let outcome = reconciler.reconcile(&target()).await.unwrap();

        assert_eq!(outcome.status, StatusPair::disconnected());
        let stored = catalog.get_device(3).unwrap();
        assert_eq!(stored.status(), StatusPair::disconnected());
        assert!(stored.last_checked_at.unwrap() > first);
    }

    #[tokio::test]
    async fn unchanged_status_is_still_written() {
        let (catalog, _client, reconciler) = setup(PointValue::Bool(true));
        reconciler.reconcile(&target()).await.unwrap();
        let again = reconciler.reconcile(&target()).await.unwrap();
        assert!(!again.changed());
        assert_eq!(catalog.get_device(3).unwrap().last_checked_at, Some(again.checked_at));
    }

    #[tokio::test]
    async fn missing_heartbeat_means_not_running() {
        let (_catalog, client, _reconciler) = setup(PointValue::Bool(true));
        let status = assess(client.as_ref(), Timeouts::default(), PLC, None).await;
        assert_eq!(status, StatusPair::new(LinkState::Connected, LinkState::Disconnected));
        assert_eq!(client.open_sessions(), 0);
    }

    #[tokio::test]
    async fn failed_heartbeat_read_means_not_running() {
        let catalog = Arc::new(DeviceCatalog::open_in_memory().unwrap());
        let client = SimulatedClient::new(AddressSpace {
            servers: vec![SimServer::new(
                PLC,
                vec![SimNode::variable("P3_running", PointValue::Bool(true)).failing_read()],
            )],
        });
        let status = assess(&client, Timeouts::default(), PLC, Some(HEARTBEAT)).await;
        assert_eq!(status, StatusPair::new(LinkState::Connected, LinkState::Disconnected));
        assert_eq!(catalog.count_devices().unwrap(), 0);
    }

    #[tokio::test]
    async fn removed_device_is_not_resurrected() {
        let (catalog, _client, reconciler) = setup(PointValue::Bool(true));
        catalog.remove_device(3).unwrap();
        let err = reconciler.reconcile(&target()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(catalog.count_devices().unwrap(), 0);
    }
}
