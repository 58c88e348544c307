//! HTTP/1.1 server on Hyper and Tokio.
//!
//! Each connection is served by Hyper; each request body is buffered (up to
//! the configured limit) and handed to the [`HttpListener`].
//!
//! # Example
//!
//! ```rust,ignore
//! use daedalus_core::Handler;
//! use daedalus_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), daedalus_server::ServerError> {
//!     let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
//!     Server::new(config, Handler::noop()).run().await
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use daedalus_core::{Handler, StatusError};
use daedalus_http::RequestAddresses;
use http::{Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::listener::{error_response, HttpListener};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address is not a socket address.
    #[error("Invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Why it did not parse.
        reason: String,
    },

    /// Binding the listening socket failed.
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The Daedalus HTTP server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    listener: Arc<HttpListener>,
}

impl Server {
    /// Creates a server running `handler` with settings from `config`.
    #[must_use]
    pub fn new(config: ServerConfig, handler: Handler) -> Self {
        let listener = HttpListener::from_config(handler, &config);
        Self::with_listener(config, listener)
    }

    /// Creates a server around an already built listener.
    #[must_use]
    pub fn with_listener(config: ServerConfig, listener: HttpListener) -> Self {
        Self {
            config,
            listener: Arc::new(listener),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the listener serving requests.
    #[must_use]
    pub fn listener(&self) -> &HttpListener {
        &self.listener
    }

    /// Runs until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and runs until `shutdown` triggers.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                reason: e.to_string(),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` triggers, then
    /// waits up to the shutdown timeout for open connections to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        tracing::info!(addr = %listener.local_addr()?, "Server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();
        let stop = shutdown.recv();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote, shutdown).await {
                                tracing::debug!(remote = %remote, error = %e, "Connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },

                () = &mut stop => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let timeout = server.config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            "Waiting up to {timeout:?} for connections to close"
        );

        if tokio::time::timeout(timeout, tracker.wait_for_shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                active = tracker.active_connections(),
                "Shutdown timeout reached"
            );
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let local = stream.local_addr().unwrap_or(remote);
        let addresses = RequestAddresses::new(local, remote);
        let server = Arc::clone(&self);

        let service = service_fn(move |request: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, addresses).await) }
        });

        let connection = http1::Builder::new()
            .keep_alive(self.config.keep_alive())
            .serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => return result,
            () = shutdown.recv() => {
                tracing::debug!(remote = %remote, "Closing connection for shutdown");
                connection.as_mut().graceful_shutdown();
            }
        }

        connection.await
    }

    async fn handle_request(
        &self,
        request: Request<Incoming>,
        addresses: RequestAddresses,
    ) -> Response<Full<Bytes>> {
        let (parts, body) = request.into_parts();

        let body = match Limited::new(body, self.config.max_body_bytes()).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return error_response(&StatusError::payload_too_large().with_details(format!(
                    "Request body exceeds {} bytes",
                    self.config.max_body_bytes()
                )))
                .map(Full::new);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return error_response(
                    &StatusError::bad_request().with_details("Unreadable request body"),
                )
                .map(Full::new);
            }
        };

        self.listener
            .dispatch(Request::from_parts(parts, body), addresses)
            .await
            .map(Full::new)
    }
}
