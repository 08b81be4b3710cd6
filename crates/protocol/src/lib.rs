//! Protocol client capability used by discovery and status reconciliation.
//!
//! The gateway only talks to devices through the [`ProtocolClient`] and
//! [`Session`] traits. [`SimulatedClient`] is the in-process backend used
//! for demos and tests; real drivers implement the same pair of traits.

pub mod client;
pub mod endpoint;
pub mod session;
pub mod simulated;

pub use client::{
    ConnectionFault, NodeClass, NodeHandle, PointValue, ProtocolClient, ProtocolFault, Session,
};
pub use endpoint::Endpoint;
pub use session::{open_session, SessionGuard, Timeouts};
pub use simulated::{AddressSpace, SimNode, SimServer, SimulatedClient};
