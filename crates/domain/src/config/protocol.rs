use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Protocol client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which protocol client implementation backs device sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolBackend {
    /// In-process address spaces loaded from `address_space`.
    #[default]
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub backend: ProtocolBackend,
    /// TOML fixture describing the simulated servers.
    #[serde(default = "d_address_space")]
    pub address_space: PathBuf,
    /// Bound on session establishment.
    #[serde(default = "d_5000")]
    pub connect_timeout_ms: u64,
    /// Bound on a single value read.
    #[serde(default = "d_3000")]
    pub read_timeout_ms: u64,
    /// Bound on a single child enumeration or attribute read.
    #[serde(default = "d_3000")]
    pub browse_timeout_ms: u64,
    /// Registrations allowed to walk address spaces at the same time.
    #[serde(default = "d_max_concurrent_registrations")]
    pub max_concurrent_registrations: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            backend: ProtocolBackend::default(),
            address_space: d_address_space(),
            connect_timeout_ms: d_5000(),
            read_timeout_ms: d_3000(),
            browse_timeout_ms: d_3000(),
            max_concurrent_registrations: d_max_concurrent_registrations(),
        }
    }
}

impl ProtocolConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn browse_timeout(&self) -> Duration {
        Duration::from_millis(self.browse_timeout_ms)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_address_space() -> PathBuf {
    PathBuf::from("address_space.toml")
}
fn d_5000() -> u64 {
    5_000
}
fn d_3000() -> u64 {
    3_000
}
fn d_max_concurrent_registrations() -> usize {
    4
}
