//! Application configuration: YAML file overlaid with `EDGE_GATEWAY__*` environment variables.

use std::path::Path;

use anyhow::{Context, Result};
use api_gateway::ApiGatewayConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use jwt_authn_plugin::JwtAuthNConfig;
use serde::{Deserialize, Serialize};

/// Environment variable prefix; `__` separates nested keys.
pub const ENV_PREFIX: &str = "EDGE_GATEWAY__";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub api_gateway: ApiGatewayConfig,
    pub jwt: JwtAuthNConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Prometheus scrape endpoint. Off unless enabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub bind_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: "0.0.0.0:9090".to_owned(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional YAML file and the environment.
    ///
    /// # Errors
    /// Returns an error if the given file does not exist or the merged
    /// configuration does not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("config file '{}' not found", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    /// Effective configuration as pretty JSON, secret redacted.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render configuration")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_yaml_with_defaults() {
        let file = write_yaml(
            r#"
jwt:
  secret: "0123456789abcdef0123456789abcdef"
api_gateway:
  bind_addr: "127.0.0.1:9090"
  public_routes:
    - method: POST
      path: /login
  routes:
    - service: auto-car-service
      path_prefix: /cars
      upstream: http://cars:8081
"#,
        );

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.api_gateway.bind_addr, "127.0.0.1:9090");
        assert_eq!(cfg.api_gateway.public_routes.len(), 1);
        assert_eq!(cfg.api_gateway.routes[0].service, "auto-car-service");
        assert_eq!(cfg.api_gateway.upstream_timeout_secs, 30);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Text);
        assert!(!cfg.metrics.enabled);
        assert_eq!(cfg.metrics.bind_addr, "0.0.0.0:9090");
    }

    #[test]
    fn metrics_section_is_read() {
        let file = write_yaml(
            "jwt:\n  secret: s\nmetrics:\n  enabled: true\n  bind_addr: \"127.0.0.1:9100\"\n",
        );

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.metrics.bind_addr, "127.0.0.1:9100");
    }

    #[test]
    fn shipped_example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/edge-gateway.yaml");

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.api_gateway.public_routes.len(), 5);
        assert_eq!(cfg.api_gateway.routes.len(), 2);
        let resolver = jwt_authn_plugin::JwtAuthNResolver::from_config(&cfg.jwt).unwrap();
        let gateway = api_gateway::ApiGateway::new(cfg.api_gateway, std::sync::Arc::new(resolver));
        assert!(gateway.build_router().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/definitely/not/here.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_is_an_error() {
        let file = write_yaml("jwt:\n  secret: s\ntelemetry:\n  enabled: true\n");
        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn printed_config_hides_secret() {
        let file = write_yaml("jwt:\n  secret: top-secret-value\nlogging:\n  format: json\n");

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.logging.format, LogFormat::Json);

        let printed = cfg.to_pretty_json().unwrap();
        assert!(!printed.contains("top-secret-value"));
        assert!(printed.contains("[REDACTED]"));
    }
}
