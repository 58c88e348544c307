//! # Daedalus
//!
//! **Composable HTTP request pipelines for async Rust**
//!
//! A request travels down an immutable chain of contexts. Each step may add
//! typed *means* (the request, a logger, a parsed body, route parameters),
//! and capabilities wrap handlers so those means are added exactly once no
//! matter how often the capability is applied.
//!
//! - **Core** - Means, contexts, modifiers, capabilities, sequencing and the
//!   error path
//! - **HTTP** - Rendering, JSON and form bodies, content negotiation,
//!   routing, per-request logging, JSON error envelopes
//! - **Server** - Hyper transport with timeouts and graceful shutdown
//! - **Config** - TOML/JSON files with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use daedalus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), daedalus::Error> {
//!     let app = JsonParsing::new().for_handler(Handler::new(|ctx: Context| async move {
//!         let body = ctx.require::<RequestBody<serde_json::Value>>()?;
//!         ctx.require::<Renderer>()?.render_json(StatusCode::OK, &**body)
//!     }));
//!
//!     let config = ConfigLoader::new()
//!         .with_optional_file("daedalus.toml")?
//!         .with_env_prefix("DAEDALUS")
//!         .load()?;
//!
//!     daedalus::run(app, &config).await
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! hyper → HttpListener → Logging → Rendering → dispatch_error(render_http_error, app)
//!                                                              │
//!              404 if nothing responded ◄──────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error;

pub use daedalus_config as config;
pub use daedalus_core as core;
pub use daedalus_http as web;
pub use daedalus_server as server;
pub use daedalus_telemetry as telemetry;
pub use http;

/// Errors raised while starting a service with [`run`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] daedalus_config::ConfigError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] daedalus_telemetry::TelemetryError),

    /// The server failed to start or run.
    #[error(transparent)]
    Server(#[from] daedalus_server::ServerError),
}

/// Installs logging and serves `handler` until SIGTERM or SIGINT.
///
/// # Errors
///
/// Fails if logging cannot be initialized or the server cannot bind.
pub async fn run(
    handler: daedalus_core::Handler,
    config: &daedalus_config::DaedalusConfig,
) -> Result<(), Error> {
    daedalus_telemetry::init_logging(&config.log_config())?;
    daedalus_server::Server::new(config.server_config(), handler)
        .run()
        .await?;
    Ok(())
}

/// Prelude module for convenient imports.
///
/// ```rust
/// use daedalus::prelude::*;
///
/// let app = request_handler([
///     dispatch_by_pattern([("/health", Handler::noop())]).unwrap(),
///     Handler::noop(),
/// ]);
/// let _ = Rendering::new().for_handler(app);
/// ```
pub mod prelude {
    pub use daedalus_config::{ConfigLoader, DaedalusConfig};
    pub use daedalus_core::{
        dispatch_error, request_handler, Capability, Context, ErrorMeans, Handler, HandlerError,
        HandlerResult, Means, Modification, Modifier, ModifierId, RequestProcessor, StatusError,
    };
    pub use daedalus_http::{
        dispatch_by_accepted, dispatch_by_language, dispatch_by_method, dispatch_by_pattern,
        render_http_error, AcceptedLanguage, AcceptedMediaType, FormDecoding, HttpMeans,
        JsonParsing, Log, Logger, Logging, Renderer, Rendering, RequestBody, RequestId,
        RouteMeans, Routing,
    };
    pub use daedalus_server::{HttpListener, Server, ServerConfig, ShutdownSignal};
    pub use daedalus_telemetry::{init_logging, LogConfig};
    pub use http::{Method, StatusCode};
}
