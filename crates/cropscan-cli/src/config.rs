//! Settings for cropscan
//!
//! A TOML file in `<config_dir>/cropscan/config.toml` (or `--config`)
//! provides defaults:
//!
//! ```toml
//! [server]
//! url = "http://fields.local:5000"
//! endpoint = "/analyze"
//! request_timeout_ms = 60000
//!
//! [output]
//! format = "json"
//! color = false
//! save_dir = "results"
//! ```
//!
//! Command-line flags win over the file. The result is a ready
//! [`ClientConfig`] plus the output settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cropscan_client::{ClientConfig, StalePolicy};
use serde::Deserialize;

use crate::output::OutputFormat;

/// Default analysis server
pub const DEFAULT_SERVER: &str = "http://localhost:5000";

/// Contents of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub url: Option<String>,
    pub endpoint: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub stale_policy: Option<StalePolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub format: Option<String>,
    pub color: Option<bool>,
    pub save_dir: Option<PathBuf>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub endpoint: Option<String>,
    pub format: Option<OutputFormat>,
    pub no_color: bool,
    pub save_dir: Option<PathBuf>,
}

/// Everything a command needs after file and flags are combined
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub format: OutputFormat,
    pub no_color: bool,
    pub save_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Read an explicit config file, or the default one if it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line overrides and build the client configuration
    pub fn resolve(self, overrides: Overrides) -> Result<Settings> {
        let server = self.server;
        let url = overrides
            .server
            .or(server.url)
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());

        let mut builder = ClientConfig::builder(url);
        if let Some(endpoint) = overrides.endpoint.or(server.endpoint) {
            builder = builder.analyze_path(endpoint);
        }
        if let Some(ms) = server.request_timeout_ms {
            builder = builder.request_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = server.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(policy) = server.stale_policy {
            builder = builder.stale_policy(policy);
        }

        let format = match (overrides.format, self.output.format) {
            (Some(format), _) => format,
            (None, Some(name)) => OutputFormat::parse(&name)?,
            (None, None) => OutputFormat::default(),
        };

        Ok(Settings {
            client: builder.build(),
            format,
            no_color: overrides.no_color || self.output.color == Some(false),
            save_dir: overrides.save_dir.or(self.output.save_dir),
        })
    }
}

/// `<config_dir>/cropscan/config.toml`, when the platform has a config dir
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cropscan").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nurl = \"http://farm.local:8000\"\nendpoint = \"/api/analyze\"\n\
             request_timeout_ms = 1500\nstale_policy = \"discard_stale\"\n\n\
             [output]\ncolor = false\nsave_dir = \"out\""
        )
        .unwrap();

        let config = FileConfig::discover(Some(file.path())).unwrap();
        assert_eq!(config.server.url.as_deref(), Some("http://farm.local:8000"));
        assert_eq!(config.server.request_timeout_ms, Some(1500));
        assert_eq!(config.output.color, Some(false));

        let settings = config.resolve(Overrides::default()).unwrap();
        assert_eq!(settings.client.connection.base_url, "http://farm.local:8000");
        assert_eq!(settings.client.endpoints.analyze, "/api/analyze");
        assert_eq!(
            settings.client.timeouts.request_timeout(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(settings.client.stale_policy, StalePolicy::DiscardStale);
        assert!(settings.no_color);
        assert_eq!(settings.save_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(FileConfig::discover(Some(Path::new("/nonexistent/cropscan.toml"))).is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(FileConfig::parse("[server]\nadress = \"http://typo\"").is_err());
        assert!(FileConfig::parse("server = [").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let config = FileConfig::parse(
            "[server]\nurl = \"http://from-file:5000\"\nendpoint = \"/from-file\"\n\n\
             [output]\nformat = \"json\"",
        )
        .unwrap();

        let settings = config
            .resolve(Overrides {
                server: Some("http://from-args:5000".to_string()),
                format: Some(OutputFormat::Csv),
                save_dir: Some(PathBuf::from("flags")),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(settings.client.connection.base_url, "http://from-args:5000");
        assert_eq!(settings.client.endpoints.analyze, "/from-file");
        assert_eq!(settings.format, OutputFormat::Csv);
        assert_eq!(settings.save_dir, Some(PathBuf::from("flags")));
    }

    #[test]
    fn test_unknown_format_in_file() {
        let config = FileConfig::parse("[output]\nformat = \"yaml\"").unwrap();
        assert!(config.resolve(Overrides::default()).is_err());
    }

    #[test]
    fn test_defaults() {
        let settings = FileConfig::default().resolve(Overrides::default()).unwrap();
        assert_eq!(settings.client.connection.base_url, DEFAULT_SERVER);
        assert_eq!(settings.client.endpoints.analyze, "/analyze");
        assert_eq!(settings.client.stale_policy, StalePolicy::LastWriterWins);
        assert_eq!(settings.format, OutputFormat::Table);
        assert!(!settings.no_color);
        assert!(settings.save_dir.is_none());
    }
}
