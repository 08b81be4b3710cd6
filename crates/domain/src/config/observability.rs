use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `[observability]`: span export for `plcbridge serve`.
///
/// JSON logs are always written. Registration, sweep and reconciliation
/// spans additionally go to an OTLP/gRPC collector once `otlp_endpoint`
/// is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Collector URL, e.g. `http://localhost:4317`. Blank disables export.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// Fraction of traces kept, `0.0..=1.0`.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl ObservabilityConfig {
    /// The collector to export to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

fn d_service_name() -> String {
    "plcbridge".into()
}

fn d_sample_rate() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn with(obs: ObservabilityConfig) -> Config {
        Config {
            observability: obs,
            ..Config::default()
        }
    }

    fn fields(config: &Config) -> Vec<String> {
        config.validate().into_iter().map(|issue| issue.field).collect()
    }

    #[test]
    fn export_is_off_by_default() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.endpoint(), None);
        assert_eq!(cfg.service_name, "plcbridge");
        assert!((cfg.sample_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn blank_endpoint_disables_export() {
        let cfg: ObservabilityConfig = toml::from_str(r#"otlp_endpoint = "  ""#).unwrap();
        assert_eq!(cfg.endpoint(), None);

        let cfg: ObservabilityConfig =
            toml::from_str(r#"otlp_endpoint = " http://collector:4317 ""#).unwrap();
        assert_eq!(cfg.endpoint(), Some("http://collector:4317"));
    }

    #[test]
    fn sample_rate_outside_unit_interval_is_rejected() {
        for rate in [-0.1, 1.5, f64::NAN] {
            let config = with(ObservabilityConfig {
                sample_rate: rate,
                ..ObservabilityConfig::default()
            });
            assert!(
                fields(&config).iter().any(|f| f == "observability.sample_rate"),
                "rate {rate} accepted"
            );
        }

        for rate in [0.0, 0.25, 1.0] {
            let config = with(ObservabilityConfig {
                sample_rate: rate,
                ..ObservabilityConfig::default()
            });
            assert!(!fields(&config).iter().any(|f| f == "observability.sample_rate"));
        }
    }

    #[test]
    fn endpoint_without_scheme_warns() {
        let config = with(ObservabilityConfig {
            otlp_endpoint: Some("collector:4317".into()),
            ..ObservabilityConfig::default()
        });
        let issue = config
            .validate()
            .into_iter()
            .find(|i| i.field == "observability.otlp_endpoint")
            .expect("missing scheme is reported");
        assert_eq!(issue.severity, crate::config::ConfigSeverity::Warning);
    }

    #[test]
    fn empty_service_name_is_an_error() {
        let config = with(ObservabilityConfig {
            service_name: " ".into(),
            ..ObservabilityConfig::default()
        });
        assert!(fields(&config).iter().any(|f| f == "observability.service_name"));
    }
}
