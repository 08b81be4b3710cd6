use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background status polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// When false the scheduler is not spawned; statuses only change on
    /// registration or an explicit `devices reconcile`.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Sleep between two sweeps.
    #[serde(default = "d_interval_sec")]
    pub interval_sec: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_sec: d_interval_sec(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec)
    }
}

fn d_true() -> bool {
    true
}
fn d_interval_sec() -> u64 {
    10
}
