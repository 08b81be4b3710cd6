//! Device runtime: registration, status reconciliation, point reads and the
//! background polling scheduler. All of it writes through the catalog.

pub mod point_read;
pub mod reconcile;
pub mod registration;
pub mod scheduler;

pub use point_read::{read_points, PointReading};
pub use reconcile::{assess, Reconciled, Reconciler};
pub use registration::{register, register_device, Registration};
pub use scheduler::{PollingScheduler, SchedulerState, SchedulerStatus, SweepSummary};
