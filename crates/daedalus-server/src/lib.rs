//! # Daedalus Server
//!
//! Hyper transport for Daedalus handler chains.
//!
//! - [`HttpListener`] - Runs one buffered request through the chain; default
//!   404, error path, escaped-error logging and request timeouts
//! - [`Server`] - HTTP/1.1 accept loop with a request body limit
//! - [`ShutdownSignal`] / [`ConnectionTracker`] - Graceful shutdown
//! - [`ServerConfig`] - Builder-style configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use daedalus_core::{Context, Handler};
//! use daedalus_http::Renderer;
//! use daedalus_server::{Server, ServerConfig};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), daedalus_server::ServerError> {
//!     let hello = Handler::new(|ctx: Context| async move {
//!         ctx.require::<Renderer>()?.render_text(StatusCode::OK, "hello")
//!     });
//!
//!     Server::new(ServerConfig::default(), hello).run().await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod listener;
mod server;
mod shutdown;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use listener::{HttpListener, HttpListenerBuilder};
pub use server::{Server, ServerError};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
