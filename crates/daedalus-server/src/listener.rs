//! The transport adapter between buffered HTTP exchanges and a handler chain.

use std::time::{Duration, Instant};

use bytes::Bytes;
use daedalus_core::{
    dispatch_error, BoxFuture, Capability, Completion, Context, Handler, HandlerResult, Means,
    RequestProcessor, StatusError,
};
use daedalus_http::{
    render_http_error, ErrorRenderingOptions, HttpMeans, Logging, Renderer, Rendering,
    RequestAddresses, REQUEST_ID_HEADER,
};
use http::{Request, Response, StatusCode};

use crate::config::ServerConfig;

/// Serves buffered requests through a handler chain.
///
/// The chain is wrapped in [`Logging`] and [`Rendering`], with the error path
/// installed via [`dispatch_error`]. Per request the listener:
///
/// 1. Builds [`HttpMeans`] and runs the processor
/// 2. Writes a 404 if nothing responded (unless disabled)
/// 3. Logs errors that escaped the error path and answers 500
/// 4. Answers 504 when the request timeout elapses first
///
/// The chain is raced against the response completion flag, so a handler
/// that keeps working after responding does not hold the response back.
///
/// # Example
///
/// ```rust
/// use daedalus_core::{Context, Handler};
/// use daedalus_http::{Renderer, RequestAddresses};
/// use daedalus_server::HttpListener;
/// use http::{Request, StatusCode};
///
/// # tokio_test::block_on(async {
/// let listener = HttpListener::builder(Handler::new(|ctx: Context| async move {
///     ctx.require::<Renderer>()?.render_text(StatusCode::OK, "hi")
/// }))
/// .build();
///
/// let request = Request::get("/").body(bytes::Bytes::new()).unwrap();
/// let response = listener.dispatch(request, RequestAddresses::default()).await;
/// assert_eq!(response.status(), StatusCode::OK);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct HttpListener {
    processor: RequestProcessor,
    request_timeout: Option<Duration>,
    default_not_found: bool,
}

impl HttpListener {
    /// Starts building a listener around `handler`.
    #[must_use]
    pub fn builder(handler: Handler) -> HttpListenerBuilder {
        HttpListenerBuilder::new(handler)
    }

    /// Creates a listener with settings taken from `config`.
    #[must_use]
    pub fn from_config(handler: Handler, config: &ServerConfig) -> Self {
        Self::builder(handler)
            .request_timeout(config.request_timeout())
            .default_not_found(config.default_not_found())
            .expose_internal_errors(config.expose_internal_errors())
            .build()
    }

    /// Returns the underlying processor.
    #[must_use]
    pub fn processor(&self) -> &RequestProcessor {
        &self.processor
    }

    /// Serves one request and returns the response to send.
    pub async fn dispatch(
        &self,
        request: Request<Bytes>,
        addresses: RequestAddresses,
    ) -> Response<Bytes> {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let http = HttpMeans::new(request, addresses);
        let completion = Completion::new();
        let ctx = Context::with_completion(Means::new().with(http.clone()), completion.clone());

        let outcome = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.processor.process_context(ctx))
                .await
                .map_err(|_| limit),
            None => Ok(self.processor.process_context(ctx).await),
        };

        let fallback = match outcome {
            Ok(Ok(true)) => None,
            Ok(Ok(false)) if self.default_not_found => Some(
                StatusError::not_found().with_details(format!("No handler for {method} {path}")),
            ),
            Ok(Ok(false)) => None,
            Ok(Err(error)) => {
                daedalus_telemetry::log_request_error!(method, path, error);
                Some(StatusError::internal())
            }
            Err(limit) => {
                tracing::warn!(
                    http.method = %method,
                    http.path = %path,
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "Request timed out"
                );
                Some(
                    StatusError::new(StatusCode::GATEWAY_TIMEOUT)
                        .with_message("Request timed out"),
                )
            }
        };

        if let Some(error) = fallback {
            if !completion.is_completed() {
                render_fallback(&http, &completion, &error);
            }
        }

        let response = http.response().to_response();
        daedalus_telemetry::log_request_complete!(
            method,
            path,
            response.status().as_u16(),
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
        );
        response
    }
}

fn render_fallback(http: &HttpMeans, completion: &Completion, error: &StatusError) {
    let request_id = http
        .response()
        .header(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok().map(str::to_owned));
    let envelope = error.to_envelope(request_id.as_deref());

    if let Err(e) =
        Renderer::new(http.clone(), completion.clone()).render_json(error.status(), &envelope)
    {
        tracing::debug!(error = %e, "Fallback response not written");
    }
}

/// Races the chain against the completion flag.
///
/// Once the response is complete the rest of the chain keeps running in the
/// background; an error it returns is logged.
fn racing_next(handler: Handler, ctx: Context) -> BoxFuture<'static, HandlerResult<bool>> {
    Box::pin(async move {
        let completion = ctx.completion().clone();
        let mut chain: BoxFuture<'static, HandlerResult<bool>> =
            Box::pin(async move { ctx.next(&handler).await });

        tokio::select! {
            biased;
            result = &mut chain => result,
            () = completion.wait() => {
                tokio::spawn(async move {
                    if let Err(error) = chain.await {
                        tracing::error!(error = %error, "Handler failed after the response was sent");
                    }
                });
                Ok(true)
            }
        }
    })
}

/// Builder for [`HttpListener`].
#[derive(Debug)]
pub struct HttpListenerBuilder {
    handler: Handler,
    error_handler: Option<Handler>,
    options: ErrorRenderingOptions,
    request_timeout: Option<Duration>,
    default_not_found: bool,
}

impl HttpListenerBuilder {
    /// Creates a builder with no timeout and the default 404 enabled.
    #[must_use]
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            error_handler: None,
            options: ErrorRenderingOptions::default(),
            request_timeout: None,
            default_not_found: true,
        }
    }

    /// Replaces [`render_http_error`] as the error path.
    #[must_use]
    pub fn error_handler(mut self, handler: Handler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Sends unexpected error messages to clients.
    #[must_use]
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.options.expose_internal_errors = expose;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables or disables the 404 written when nothing responded.
    #[must_use]
    pub fn default_not_found(mut self, enabled: bool) -> Self {
        self.default_not_found = enabled;
        self
    }

    /// Builds the listener.
    #[must_use]
    pub fn build(self) -> HttpListener {
        let on_error = self
            .error_handler
            .unwrap_or_else(|| render_http_error(self.options));
        let chain = Logging::new()
            .and(Rendering::new())
            .for_handler(dispatch_error(on_error, self.handler));

        HttpListener {
            processor: RequestProcessor::new(chain).with_next(racing_next),
            request_timeout: self.request_timeout,
            default_not_found: self.default_not_found,
        }
    }
}

/// Builds an error response outside any handler chain.
pub(crate) fn error_response(error: &StatusError) -> Response<Bytes> {
    let body = serde_json::to_vec(&error.to_envelope(None)).unwrap_or_default();
    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() = error.status();
    let body_len = response.body().len();
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        http::header::CONTENT_LENGTH,
        http::HeaderValue::from(body_len),
    );
    response
}
