//! Device endpoints.
//!
//! - `POST   /v1/devices/register`         : discover and catalogue a device
//! - `GET    /v1/devices/status`           : status pair of every device
//! - `GET    /v1/devices/:device_no`       : one device record
//! - `GET    /v1/devices/:device_no/points`: catalogued points
//! - `DELETE /v1/devices/:device_no`       : remove a device and its points

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pb_domain::trace::TraceEvent;
use pb_domain::{Device, LinkState};
use pb_protocol::Endpoint;

use crate::api::{api_error, error_response};
use crate::runtime::registration;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub device_no: u32,
    pub address: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    status: &'static str,
    device_no: u32,
    points_registered: u32,
    heartbeat_point: Option<String>,
    link_status: LinkState,
    liveness_status: LinkState,
}

#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    pub device_no: u32,
    pub address: String,
    pub link_status: LinkState,
    pub liveness_status: LinkState,
    pub combined_connected: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl From<&Device> for DeviceStatus {
    fn from(device: &Device) -> Self {
        Self {
            device_no: device.device_no,
            address: device.address.clone(),
            link_status: device.link_status,
            liveness_status: device.liveness_status,
            combined_connected: device.status().combined_connected(),
            last_checked_at: device.last_checked_at,
            message: status_message(device),
        }
    }
}

/// Human-readable summary of a device's status pair.
pub fn status_message(device: &Device) -> String {
    let no = device.device_no;
    if device.last_checked_at.is_none() {
        return format!("PLC {no} not checked yet");
    }
    let host = Endpoint::display_host(&device.address);
    match (device.link_status, device.liveness_status) {
        (LinkState::Connected, LinkState::Connected) => format!("PLC {no} running ({host})"),
        (LinkState::Connected, LinkState::Disconnected) => {
            format!("PLC {no} reachable but not running ({host})")
        }
        (LinkState::Disconnected, _) => format!("PLC {no} unreachable ({host})"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let address = body.address.trim();
    if address.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "address must not be empty");
    }

    match registration::register(&state, body.device_no, address).await {
        Ok(reg) => Json(RegisterResponse {
            status: "connected",
            device_no: reg.device_no,
            points_registered: reg.points_registered,
            heartbeat_point: reg.heartbeat_point,
            link_status: reg.link_status,
            liveness_status: reg.liveness_status,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn list_status(State(state): State<AppState>) -> Response {
    match pb_catalog::blocking(&state.catalog, |c| c.list_devices()).await {
        Ok(devices) => {
            let devices: Vec<DeviceStatus> = devices.iter().map(DeviceStatus::from).collect();
            Json(serde_json::json!({
                "count": devices.len(),
                "devices": devices,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn get_device(State(state): State<AppState>, Path(device_no): Path<u32>) -> Response {
    match pb_catalog::blocking(&state.catalog, move |c| c.get_device(device_no)).await {
        Ok(device) => Json(device).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn list_points(State(state): State<AppState>, Path(device_no): Path<u32>) -> Response {
    let points = pb_catalog::blocking(&state.catalog, move |c| {
        c.get_device(device_no)?;
        c.list_points(device_no)
    })
    .await;
    match points {
        Ok(points) => Json(serde_json::json!({
            "device_no": device_no,
            "count": points.len(),
            "points": points,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn remove_device(State(state): State<AppState>, Path(device_no): Path<u32>) -> Response {
    match pb_catalog::blocking(&state.catalog, move |c| c.remove_device(device_no)).await {
        Ok(report) => {
            TraceEvent::DeviceRemoved {
                device_no,
                devices_removed: report.devices_removed,
                points_removed: report.points_removed,
            }
            .emit();
            Json(serde_json::json!({
                "device_no": device_no,
                "devices_removed": report.devices_removed,
                "points_removed": report.points_removed,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}
