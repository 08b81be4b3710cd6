use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Location of the SQLite device catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "d_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { path: d_path() }
    }
}

fn d_path() -> PathBuf {
    PathBuf::from("./data/plcbridge.db")
}
