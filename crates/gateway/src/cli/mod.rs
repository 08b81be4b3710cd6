pub mod config;
pub mod devices;
pub mod doctor;

use clap::{Parser, Subcommand};

/// plcbridge: PLC registration, discovery and status reconciliation.
#[derive(Debug, Parser)]
#[command(name = "plcbridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server and the polling scheduler (default when no
    /// subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect and manage catalogued devices.
    #[command(subcommand)]
    Devices(DevicesCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// Print every catalogued device with its status.
    List {
        /// Output as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Discover a device and add it to the catalog.
    Register {
        device_no: u32,
        /// Endpoint address, e.g. opc.tcp://10.0.0.3:4840
        address: String,
    },
    /// Remove a device and all of its points.
    Remove { device_no: u32 },
    /// Run one reconciliation sweep over every heartbeat device now.
    Reconcile,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `PB_CONFIG` (or
/// `config.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: pb_domain::config::Config
pub fn load_config() -> anyhow::Result<(pb_domain::config::Config, String)> {
    let config_path = std::env::var("PB_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

/// Parse `path`, falling back to defaults when the file does not exist.
pub fn load_config_from(path: &str) -> anyhow::Result<pb_domain::config::Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(pb_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))
}
