pub mod config;
pub mod device;
pub mod error;
pub mod naming;
pub mod trace;

pub use device::{Device, LinkState, PollTarget, Point, RemovalReport, StatusPair};
pub use error::{Error, Result};
