//! The root configuration type.

use std::time::Duration;

use daedalus_server::ServerConfig;
use daedalus_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ErrorsSection, LoggingSection, ServerSection};

/// Complete Daedalus service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use daedalus_config::DaedalusConfig;
///
/// let config = DaedalusConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.errors.default_not_found);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct DaedalusConfig {
    /// Transport settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Error path settings.
    #[serde(default)]
    pub errors: ErrorsSection,
}

impl DaedalusConfig {
    /// Development preset: pretty debug logs, internal errors exposed.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;
        config.errors.expose_internal_errors = true;
        config
    }

    /// Production preset: JSON info logs, internal errors hidden.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.errors.expose_internal_errors = false;
        config
    }

    /// Checks values serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.logging.enabled {
            daedalus_telemetry::create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        Ok(())
    }

    /// Builds the transport configuration.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let request_timeout = (self.server.request_timeout_ms > 0)
            .then(|| Duration::from_millis(self.server.request_timeout_ms));

        ServerConfig::builder()
            .http_addr(self.server.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(self.server.shutdown_timeout_secs))
            .request_timeout(request_timeout)
            .max_body_bytes(self.server.max_body_bytes)
            .keep_alive(self.server.keep_alive)
            .default_not_found(self.errors.default_not_found)
            .expose_internal_errors(self.errors.expose_internal_errors)
            .build()
    }

    /// Builds the logging configuration.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from(&self.logging)
    }
}

impl From<&LoggingSection> for LogConfig {
    fn from(section: &LoggingSection) -> Self {
        let base = match section.format {
            LogFormat::Pretty => LogConfig::development(),
            LogFormat::Json | LogFormat::Compact => LogConfig::production(),
        };

        LogConfig {
            enabled: section.enabled,
            file_line_info: section.include_location,
            ..base
        }
        .with_level(section.level.clone())
        .with_format(section.format)
    }
}
