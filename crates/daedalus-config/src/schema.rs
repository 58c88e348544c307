//! Configuration sections.

use daedalus_telemetry::LogFormat;
use serde::{Deserialize, Serialize};

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Request timeout in milliseconds; 0 disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Enable HTTP/1.1 keep-alive.
    #[serde(default = "default_true")]
    pub keep_alive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            keep_alive: true,
        }
    }
}

fn default_http_addr() -> String {
    daedalus_server::DEFAULT_HTTP_ADDR.to_string()
}

fn default_shutdown_timeout() -> u64 {
    daedalus_server::DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    daedalus_server::DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_max_body_bytes() -> usize {
    daedalus_server::DEFAULT_MAX_BODY_BYTES
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[errors]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ErrorsSection {
    /// Answer 404 when no handler responds.
    #[serde(default = "default_true")]
    pub default_not_found: bool,

    /// Send unexpected error messages to clients.
    #[serde(default)]
    pub expose_internal_errors: bool,
}

impl Default for ErrorsSection {
    fn default() -> Self {
        Self {
            default_not_found: true,
            expose_internal_errors: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_section_defaults() {
        let section = ServerSection::default();
        assert_eq!(section.http_addr, "0.0.0.0:8080");
        assert_eq!(section.shutdown_timeout_secs, 30);
        assert_eq!(section.request_timeout_ms, 30_000);
        assert!(section.keep_alive);
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let section: ServerSection = toml::from_str(r#"http_addr = "127.0.0.1:1""#).unwrap();
        assert_eq!(section.http_addr, "127.0.0.1:1");
        assert_eq!(section.max_body_bytes, daedalus_server::DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ErrorsSection, _> = toml::from_str("show_stack_traces = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_logging_format_from_toml() {
        let section: LoggingSection = toml::from_str(r#"format = "compact""#).unwrap();
        assert_eq!(section.format, LogFormat::Compact);
        assert_eq!(section.level, "info");
    }
}
