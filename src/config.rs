//! Configuration management for the petitions exporter
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section is optional; a missing file section falls back to the
//! defaults of the reference deployment (port 8080, ten minute poll
//! interval, the public petitions API).

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable that overrides `upstream.base_url`
pub const PETITIONS_URL_ENV: &str = "PETITIONS_URL";

/// Public petitions API used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://petition.parliament.uk";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long in-flight HTTP requests may drain after a shutdown signal
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

impl ServerConfig {
    /// Bind address parsed from `host`
    ///
    /// Hostnames are rejected; `host` must be a literal IPv4 or IPv6 address.
    pub fn ip_addr(&self) -> AppResult<IpAddr> {
        self.host.parse().map_err(|_| {
            AppError::Config(format!(
                "server.host must be an IP address, got {:?}",
                self.host
            ))
        })
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_grace() -> u64 {
    30
}

/// Upstream petitions API and polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Deadline for each individual page request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Maximum number of pages followed in one listing
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Remove gauges for petitions that disappeared since the last fetch
    #[serde(default)]
    pub retract_stale_petitions: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_seconds: default_poll_interval(),
            request_timeout_seconds: default_request_timeout(),
            max_pages: default_max_pages(),
            retract_stale_petitions: false,
        }
    }
}

impl UpstreamConfig {
    /// Interval between fetch cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Deadline for each page request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_poll_interval() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_pages() -> usize {
    1000
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let mut config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;
        config.normalize();

        Ok(config)
    }

    /// Apply a base URL override, typically read from `PETITIONS_URL`
    ///
    /// Empty or missing overrides leave the configured value untouched.
    pub fn with_base_url_override(mut self, base_url: Option<String>) -> AppResult<Self> {
        if let Some(base_url) = base_url.filter(|url| !url.trim().is_empty()) {
            tracing::debug!(base_url = %base_url, "Overriding upstream base URL from environment");
            self.upstream.base_url = base_url.trim().to_string();
            self.validate()?;
            self.normalize();
        }
        Ok(self)
    }

    /// Strip trailing slashes from the base URL
    ///
    /// Metric labels and petition URLs are built from the base URL, so it
    /// must have a single canonical spelling.
    fn normalize(&mut self) {
        let trimmed = self.upstream.base_url.trim_end_matches('/').to_string();
        self.upstream.base_url = trimmed;
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()` and `from_str()`, but
    /// can also be called explicitly when constructing Config in code.
    pub fn validate(&self) -> AppResult<()> {
        self.server.ip_addr()?;

        let base_url = &self.upstream.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "upstream.base_url must start with http:// or https://, got {:?}",
                base_url
            )));
        }
        if base_url.contains('?') || base_url.contains('#') {
            return Err(AppError::Config(format!(
                "upstream.base_url must not contain a query or fragment, got {:?}",
                base_url
            )));
        }

        for (field, value, max) in [
            (
                "upstream.poll_interval_seconds",
                self.upstream.poll_interval_seconds,
                86_400,
            ),
            (
                "upstream.request_timeout_seconds",
                self.upstream.request_timeout_seconds,
                300,
            ),
            (
                "server.shutdown_grace_seconds",
                self.server.shutdown_grace_seconds,
                300,
            ),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "{} must be greater than 0, got {}",
                    field, value
                )));
            }
            if value > max {
                return Err(AppError::Config(format!(
                    "{} cannot exceed {}, got {}",
                    field, max, value
                )));
            }
        }

        if self.upstream.max_pages == 0 {
            return Err(AppError::Config(
                "upstream.max_pages must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let mut config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        config.normalize();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 9100
shutdown_grace_seconds = 10

[upstream]
base_url = "http://localhost:4000/"
poll_interval_seconds = 60
request_timeout_seconds = 5
max_pages = 20
retract_stale_petitions = true

[observability]
log_level = "debug"
log_format = "text"
"#;

    #[test]
    fn test_config_from_str_parses_successfully() {
        let config = Config::from_str(TEST_CONFIG).expect("should parse config");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.shutdown_grace_seconds, 10);
        assert_eq!(config.upstream.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.upstream.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.upstream.max_pages, 20);
        assert!(config.upstream.retract_stale_petitions);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, LogFormat::Text);
    }

    #[test]
    fn test_config_strips_trailing_slash_from_base_url() {
        let config = Config::from_str(TEST_CONFIG).unwrap();
        assert_eq!(config.upstream.base_url, "http://localhost:4000");
    }

    #[test]
    fn test_empty_config_uses_reference_defaults() {
        let config = Config::from_str("").expect("empty config should parse");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.shutdown_grace_seconds, 30);
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.upstream.poll_interval(), Duration::from_secs(600));
        assert_eq!(config.upstream.request_timeout_seconds, 30);
        assert_eq!(config.upstream.max_pages, 1000);
        assert!(!config.upstream.retract_stale_petitions);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_base_url_override_replaces_configured_value() {
        let config = Config::default()
            .with_base_url_override(Some("http://127.0.0.1:5555/".to_string()))
            .unwrap();
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:5555");
    }

    #[test]
    fn test_empty_base_url_override_is_ignored() {
        let config = Config::default()
            .with_base_url_override(Some(String::new()))
            .unwrap();
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);

        let config = Config::default().with_base_url_override(None).unwrap();
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_base_url_override_fails() {
        let result = Config::default().with_base_url_override(Some("localhost:80".to_string()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_config_validation_missing_protocol_base_url_fails() {
        let result = Config::from_str(
            r#"
[upstream]
base_url = "petition.parliament.uk"
"#,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn test_config_validation_base_url_with_query_fails() {
        let result = Config::from_str(
            r#"
[upstream]
base_url = "https://petition.parliament.uk/?state=open"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_zero_interval_fails() {
        let result = Config::from_str(
            r#"
[upstream]
poll_interval_seconds = 0
"#,
        );
        let err = result.unwrap_err();
        assert!(
            err.to_string()
                .contains("upstream.poll_interval_seconds must be greater than 0")
        );
    }

    #[test]
    fn test_config_validation_excessive_timeout_fails() {
        let result = Config::from_str(
            r#"
[upstream]
request_timeout_seconds = 301
"#,
        );
        let err = result.unwrap_err();
        assert!(
            err.to_string()
                .contains("upstream.request_timeout_seconds cannot exceed 300")
        );
    }

    #[test]
    fn test_config_validation_zero_max_pages_fails() {
        let result = Config::from_str(
            r#"
[upstream]
max_pages = 0
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_hostname_host_fails() {
        let result = Config::from_str(
            r#"
[server]
host = "localhost"
"#,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("server.host must be an IP address"));
    }

    #[test]
    fn test_ipv6_host_is_accepted() {
        let config = Config::from_str(
            r#"
[server]
host = "::1"
"#,
        )
        .unwrap();
        assert_eq!(
            config.server.ip_addr().unwrap(),
            "::1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_log_format_fails_to_parse() {
        let result = Config::from_str(
            r#"
[observability]
log_format = "xml"
"#,
        );
        assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
    }
}
