use serde::Serialize;

use crate::device::LinkState;

/// Structured trace events emitted across all plcbridge crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    AddressSpaceWalked {
        address: String,
        candidates: usize,
        skipped_children: usize,
        failed_browses: usize,
        duration_ms: u64,
    },
    DeviceRegistered {
        device_no: u32,
        address: String,
        points: usize,
        points_inserted: usize,
        heartbeat_point: Option<String>,
        link_status: LinkState,
        liveness_status: LinkState,
    },
    DeviceRemoved {
        device_no: u32,
        devices_removed: usize,
        points_removed: usize,
    },
    StatusChanged {
        device_no: u32,
        link_status: LinkState,
        liveness_status: LinkState,
        previous_link_status: LinkState,
        previous_liveness_status: LinkState,
    },
    SweepCompleted {
        devices: usize,
        reconciled: usize,
        failed: usize,
        discarded: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pb_event");
    }
}
