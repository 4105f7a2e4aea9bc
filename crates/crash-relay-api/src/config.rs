//! Configuration types for the HTTP service

use crate::errors::{ConfigError, UrlError};
use crash_relay_core::SecretValue;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Service configuration
///
/// Every section carries serde defaults, so a partially specified source
/// deserializes cleanly. Required values are enforced by [`ServiceConfig::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Inbound webhook settings
    pub crashlytics: CrashlyticsConfig,

    /// Outbound ingest settings
    pub humio: HumioConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check required values and the ingest URL.
    ///
    /// All missing values are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.crashlytics.auth_token.is_blank() {
            missing.push("crashlytics-auth-token".to_string());
        }
        if self.humio.ingest_token.is_blank() {
            missing.push("humio-ingest-token".to_string());
        }
        if self.humio.url.trim().is_empty() {
            missing.push("humio-url".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing { keys: missing });
        }

        self.humio.base_url()?;

        if self.humio.ingest_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "humio ingest endpoint must not be empty".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Timeout in seconds, shared by inbound requests and the ingest client
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 10,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Crashlytics webhook configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrashlyticsConfig {
    /// Token expected in the `token` query parameter
    pub auth_token: SecretValue,
}

/// Humio ingest configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HumioConfig {
    /// Base URL of the Humio HTTP API, e.g. `https://cloud.humio.com`
    pub url: String,

    /// Ingest token sent as a bearer token
    pub ingest_token: SecretValue,

    /// Name of the ingest endpoint under `/api/v1/ingest/`
    pub ingest_endpoint: String,
}

impl HumioConfig {
    /// Parse and validate the configured base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        validate_url(&self.url).map_err(|source| ConfigError::InvalidUrl {
            key: "humio-url".to_string(),
            source,
        })
    }
}

impl Default for HumioConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ingest_token: SecretValue::default(),
            ingest_endpoint: "humio-structured".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Parse a base URL, requiring an explicit `http` or `https` scheme.
///
/// Dot segments in the path are resolved during parsing.
pub fn validate_url(raw: &str) -> Result<Url, UrlError> {
    let url = match Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => return Err(UrlError::SchemeMissing),
        Err(e) => return Err(UrlError::Parse(e)),
    };

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UrlError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}
