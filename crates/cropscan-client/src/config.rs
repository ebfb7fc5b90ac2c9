//! Client configuration with YAML support

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Analysis client configuration
///
/// Can be loaded from YAML or JSON, or constructed with [`ClientConfig::builder`].
///
/// ```yaml
/// connection:
///   base_url: "http://localhost:5000"
/// endpoints:
///   analyze: "/analyze"
/// timeouts:
///   connect_ms: 10000
/// stale_policy: discard_stale
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection settings
    pub connection: ConnectionConfig,

    /// Endpoint paths
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// What to do with a response that arrives after a newer submission
    #[serde(default)]
    pub stale_policy: StalePolicy,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the server
    pub base_url: String,
}

/// Endpoint paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Form submission target: POST
    #[serde(default = "default_analyze_path")]
    pub analyze: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            analyze: default_analyze_path(),
        }
    }
}

fn default_analyze_path() -> String {
    "/analyze".to_string()
}

/// Timeout configuration
///
/// Both timeouts are unset by default: a submission waits for as long as the
/// server takes to answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Total request timeout in milliseconds
    #[serde(default)]
    pub request_ms: Option<u64>,

    /// Connect timeout in milliseconds
    #[serde(default)]
    pub connect_ms: Option<u64>,
}

impl TimeoutsConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_ms.map(Duration::from_millis)
    }
}

/// Handling of responses that resolve out of submission order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Every response renders; whichever resolves last wins
    #[default]
    LastWriterWins,
    /// Only the response to the most recent submission renders
    DiscardStale,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the server URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig {
                base_url: base_url.into(),
            },
            endpoints: EndpointsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            stale_policy: StalePolicy::default(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(base_url),
        }
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Override the analyze endpoint path
    pub fn analyze_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoints.analyze = path.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.request_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.connect_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn stale_policy(mut self, policy: StalePolicy) -> Self {
        self.config.stale_policy = policy;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_minimal() {
        let config = ClientConfig::from_yaml("connection:\n  base_url: http://localhost:5000\n")
            .unwrap();
        assert_eq!(config.connection.base_url, "http://localhost:5000");
        assert_eq!(config.endpoints.analyze, "/analyze");
        assert!(config.timeouts.request_timeout().is_none());
        assert!(config.timeouts.connect_timeout().is_none());
        assert_eq!(config.stale_policy, StalePolicy::LastWriterWins);
    }

    #[test]
    fn test_yaml_full() {
        let yaml = r#"
connection:
  base_url: "http://farm.local:8000"
endpoints:
  analyze: "/api/analyze"
timeouts:
  request_ms: 60000
  connect_ms: 2500
stale_policy: discard_stale
"#;
        let config = ClientConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.endpoints.analyze, "/api/analyze");
        assert_eq!(
            config.timeouts.request_timeout(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            config.timeouts.connect_timeout(),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(config.stale_policy, StalePolicy::DiscardStale);
    }

    #[test]
    fn test_json_requires_connection() {
        assert!(ClientConfig::from_json(r#"{"endpoints":{"analyze":"/x"}}"#).is_err());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder("http://localhost:9000")
            .analyze_path("/v2/analyze")
            .connect_timeout(Duration::from_secs(3))
            .stale_policy(StalePolicy::DiscardStale)
            .build();

        assert_eq!(config.connection.base_url, "http://localhost:9000");
        assert_eq!(config.endpoints.analyze, "/v2/analyze");
        assert_eq!(config.timeouts.connect_ms, Some(3000));
        assert!(config.timeouts.request_ms.is_none());

        let round_trip = ClientConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(round_trip.stale_policy, StalePolicy::DiscardStale);
    }

    #[test]
    fn test_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "connection:\n  base_url: http://fields.local:5000\nstale_policy: discard_stale"
        )
        .unwrap();

        let config = ClientConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.connection.base_url, "http://fields.local:5000");
        assert_eq!(config.stale_policy, StalePolicy::DiscardStale);

        let missing = ClientConfig::from_yaml_file("/nonexistent/cropscan.yaml");
        assert!(matches!(missing, Err(ConfigError::IoError(_))));
    }
}
