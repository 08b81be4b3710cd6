//! Running catalog operations from async code.

use std::sync::Arc;

use pb_domain::{Error, Result};

use crate::DeviceCatalog;

/// Run `op` against a shared catalog on tokio's blocking pool.
///
/// SQLite calls may wait on disk, on the connection lock or on another
/// writer's `busy_timeout`; none of that may stall a runtime worker.
pub async fn blocking<T, F>(catalog: &Arc<DeviceCatalog>, op: F) -> Result<T>
where
    F: FnOnce(&DeviceCatalog) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let catalog = Arc::clone(catalog);
    tokio::task::spawn_blocking(move || op(&catalog))
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
}
