//! Address-space discovery: tree walk followed by the per-device name filter.

pub mod filter;
pub mod walker;

pub use filter::filter_points;
pub use walker::{walk, WalkReport};
