//! # Daedalus Config
//!
//! Typed configuration for Daedalus services.
//!
//! - [`DaedalusConfig`] - `[server]`, `[logging]` and `[errors]` sections
//! - [`ConfigLoader`] - Defaults, file, `.env`, then environment overrides
//! - Conversions into [`daedalus_server::ServerConfig`] and
//!   [`daedalus_telemetry::LogConfig`]
//!
//! ## Example
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 5000
//! max_body_bytes = 1048576
//!
//! [logging]
//! level = "info,daedalus_server=debug"
//! format = "json"
//!
//! [errors]
//! default_not_found = true
//! expose_internal_errors = false
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::DaedalusConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{ErrorsSection, LoggingSection, ServerSection};
