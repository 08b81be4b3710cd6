mod catalog;
mod observability;
mod polling;
mod protocol;
mod server;

pub use catalog::*;
pub use observability::*;
pub use polling::*;
pub use protocol::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be greater than 0",
            ));
        }

        if self.catalog.path.as_os_str().is_empty() {
            errors.push(ConfigError::error("catalog.path", "path must not be empty"));
        }

        for (field, value) in [
            ("protocol.connect_timeout_ms", self.protocol.connect_timeout_ms),
            ("protocol.read_timeout_ms", self.protocol.read_timeout_ms),
            ("protocol.browse_timeout_ms", self.protocol.browse_timeout_ms),
        ] {
            if value == 0 {
                errors.push(ConfigError::error(field, "timeout must be greater than 0"));
            }
        }
        if self.protocol.max_concurrent_registrations == 0 {
            errors.push(ConfigError::error(
                "protocol.max_concurrent_registrations",
                "must be greater than 0",
            ));
        }
        if self.protocol.backend == ProtocolBackend::Simulated
            && !self.protocol.address_space.exists()
        {
            errors.push(ConfigError::warning(
                "protocol.address_space",
                format!(
                    "{} not found; the simulated backend will expose no servers",
                    self.protocol.address_space.display()
                ),
            ));
        }

        if self.polling.enabled && self.polling.interval_sec == 0 {
            errors.push(ConfigError::error(
                "polling.interval_sec",
                "interval must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample rate must be between 0.0 and 1.0",
            ));
        }
        if self.observability.service_name.trim().is_empty() {
            errors.push(ConfigError::error(
                "observability.service_name",
                "service name must not be empty",
            ));
        }
        if let Some(endpoint) = self.observability.endpoint() {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                errors.push(ConfigError::warning(
                    "observability.otlp_endpoint",
                    format!("{endpoint} has no http:// or https:// scheme"),
                ));
            }
        }

        // CORS: warn if wildcard is used.
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        errors
    }
}
