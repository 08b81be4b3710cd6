//! Device and point records shared by the catalog and the runtime.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Link state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Two-valued health signal used for both link and liveness status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Connected,
    #[default]
    Disconnected,
}

impl LinkState {
    pub fn from_bool(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            other => Err(format!("unknown link state '{other}'")),
        }
    }
}

/// Link status paired with liveness status, always written together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusPair {
    pub link: LinkState,
    pub liveness: LinkState,
}

impl StatusPair {
    pub fn new(link: LinkState, liveness: LinkState) -> Self {
        Self { link, liveness }
    }

    /// Conservative fallback used whenever a device cannot be assessed.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Both the protocol link and the controller itself report up.
    pub fn combined_connected(&self) -> bool {
        self.link.is_connected() && self.liveness.is_connected()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Device / point records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A managed controller as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_no: u32,
    pub address: String,
    /// Empty when no heartbeat point was discovered.
    #[serde(default)]
    pub heartbeat_point_name: String,
    /// Empty when no heartbeat point was discovered.
    #[serde(default)]
    pub heartbeat_point_id: String,
    #[serde(default)]
    pub link_status: LinkState,
    #[serde(default)]
    pub liveness_status: LinkState,
    #[serde(default)]
    pub point_count: u32,
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Device {
    /// A freshly registered device with no heartbeat and both statuses down.
    pub fn new(device_no: u32, address: impl Into<String>) -> Self {
        Self {
            device_no,
            address: address.into(),
            heartbeat_point_name: String::new(),
            heartbeat_point_id: String::new(),
            link_status: LinkState::Disconnected,
            liveness_status: LinkState::Disconnected,
            point_count: 0,
            last_checked_at: None,
        }
    }

    pub fn status(&self) -> StatusPair {
        StatusPair::new(self.link_status, self.liveness_status)
    }

    pub fn has_heartbeat(&self) -> bool {
        !self.heartbeat_point_id.is_empty()
    }
}

/// One catalogued data point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub device_no: u32,
    pub name: String,
    pub identifier: String,
}

/// What the polling scheduler needs to reconcile one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub device_no: u32,
    pub address: String,
    pub heartbeat_point_id: String,
}

impl PollTarget {
    pub fn heartbeat(&self) -> Option<&str> {
        Some(self.heartbeat_point_id.as_str()).filter(|id| !id.is_empty())
    }
}

/// Row counts deleted by a device removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct RemovalReport {
    pub devices_removed: usize,
    pub points_removed: usize,
}

impl RemovalReport {
    pub fn is_empty(&self) -> bool {
        self.devices_removed == 0 && self.points_removed == 0
    }
}
