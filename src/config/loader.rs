//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::service::{LbType, Protocol};
    use std::io::Write;

    const SAMPLE: &str = r#"
[http]
bind_address = "127.0.0.1:18080"

[auth]
jwt_secret = "s3cret"

[[services]]
name = "svc1"
[services.rule]
protocol = "http"
rule = "/svc1"
[services.load_balance]
ip_list = ["10.0.0.1:80", "10.0.0.2:80"]
weight_list = [1, 1]

[[services]]
name = "echo"
[services.rule]
protocol = "tcp"
port = 18001
[services.access_control]
service_flow_limit = 10
[services.load_balance]
round_type = "weight_round_robin"
ip_list = ["127.0.0.1:9000"]

[[tenants]]
app_id = "app_a"
name = "Tenant A"
qps = 5
"#;

    #[test]
    fn loads_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.http.bind_address, "127.0.0.1:18080");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[1].protocol(), Protocol::Tcp);
        assert_eq!(config.services[1].load_balance.round_type, LbType::WeightRoundRobin);
        assert_eq!(config.services[1].access_control.service_flow_limit, 10);
        assert_eq!(config.tenants[0].qps, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.flow.tick_interval_ms, 1_000);
        assert_eq!(config.shutdown.drain_timeout_secs, 10);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = parse_config("[http\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn semantic_errors_are_reported() {
        let err = parse_config(
            r#"
[[services]]
name = "empty"
[services.rule]
protocol = "tcp"
port = 9000
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("no backend addresses"));
    }
}
