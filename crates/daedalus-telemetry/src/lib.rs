//! # Daedalus Telemetry
//!
//! Logging setup for Daedalus services.
//!
//! - [`LogConfig`] / [`LogFormat`] - What to log and how to format it
//! - [`init_logging`] - Installs the global `tracing` subscriber
//! - [`fields`] - Standard field names used across Daedalus crates
//!
//! Per-request logging lives in `daedalus-http`; this crate only decides
//! where those events go.

#![doc(html_root_url = "https://docs.rs/daedalus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
