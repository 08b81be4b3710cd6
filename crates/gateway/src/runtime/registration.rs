//! Device registration: connect, discover, derive status, persist.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use pb_catalog::DeviceCatalog;
use pb_domain::trace::TraceEvent;
use pb_domain::{naming, Device, Error, LinkState};
use pb_protocol::{open_session, ProtocolClient, Timeouts};

use crate::discovery::{filter_points, walk};
use crate::runtime::reconcile::read_liveness;
use crate::state::AppState;

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub device_no: u32,
    pub address: String,
    /// Points discovered for this device in this registration.
    pub points_registered: u32,
    /// Points that were not already catalogued.
    pub points_inserted: usize,
    pub heartbeat_point: Option<String>,
    pub link_status: LinkState,
    pub liveness_status: LinkState,
}

/// Register a device through the shared state, bounded by the configured
/// number of concurrent registrations.
pub async fn register(state: &AppState, device_no: u32, address: &str) -> pb_domain::Result<Registration> {
    let _permit = state
        .registrations
        .acquire()
        .await
        .map_err(|_| Error::Other("registration is shutting down".into()))?;
    register_device(
        &state.catalog,
        state.client.as_ref(),
        state.timeouts,
        device_no,
        address,
    )
    .await
}

/// Run the full registration workflow for one device.
///
/// Nothing is written to the catalog unless a session could be opened; the
/// device row and its points are then committed in one transaction. The
/// stored row starts unchecked until the first reconciliation.
pub async fn register_device(
    catalog: &Arc<DeviceCatalog>,
    client: &dyn ProtocolClient,
    timeouts: Timeouts,
    device_no: u32,
    address: &str,
) -> pb_domain::Result<Registration> {
    let started = Instant::now();
    let session = open_session(client, address, timeouts).await.map_err(|fault| {
        tracing::warn!(device_no, address = %address, error = %fault, "registration failed to connect");
        Error::from(fault)
    })?;

    let report = walk(&session, &session.root_node()).await;
    TraceEvent::AddressSpaceWalked {
        address: address.to_owned(),
        candidates: report.points.len(),
        skipped_children: report.skipped,
        failed_browses: report.browse_failures,
        duration_ms: started.elapsed().as_millis() as u64,
    }
    .emit();

    let points = filter_points(&report.points, device_no);
    let heartbeat_name = naming::heartbeat_point_name(device_no);
    let heartbeat_id = points.get(&heartbeat_name).cloned();

    let liveness = match &heartbeat_id {
        Some(id) => read_liveness(&session, id).await,
        None => {
            tracing::info!(device_no, heartbeat = %heartbeat_name, "no heartbeat point discovered");
            LinkState::Disconnected
        }
    };
    session.close().await;

    // Discovery succeeded, so the link is up regardless of the heartbeat.
    let link = LinkState::Connected;

    let mut device = Device::new(device_no, address);
    device.link_status = link;
    device.liveness_status = liveness;
    device.point_count = u32::try_from(points.len()).unwrap_or(u32::MAX);
    if let Some(id) = &heartbeat_id {
        device.heartbeat_point_name = heartbeat_name.clone();
        device.heartbeat_point_id = id.clone();
    }

    let points_registered = device.point_count;
    let rows: Vec<(String, String)> = points.into_iter().collect();
    let row_count = rows.len();
    let inserted = pb_catalog::blocking(catalog, move |c| c.register(&device, &rows)).await?;

    let heartbeat_point = heartbeat_id.map(|_| heartbeat_name);
    TraceEvent::DeviceRegistered {
        device_no,
        address: address.to_owned(),
        points: row_count,
        points_inserted: inserted,
        heartbeat_point: heartbeat_point.clone(),
        link_status: link,
        liveness_status: liveness,
    }
    .emit();

    Ok(Registration {
        device_no,
        address: address.to_owned(),
        points_registered,
        points_inserted: inserted,
        heartbeat_point,
        link_status: link,
        liveness_status: liveness,
    })
}
