//! SQLite-backed device and point catalog.

mod offload;
mod schema;
mod store;

pub use offload::blocking;
pub use store::DeviceCatalog;
