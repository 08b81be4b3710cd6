//! plcbridge gateway: HTTP API, CLI, discovery and the status runtime.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod discovery;
pub mod runtime;
pub mod state;
