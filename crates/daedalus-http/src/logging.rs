//! The logger contract and the capability that provides it.

use crate::exchange::HttpMeans;
use daedalus_core::{
    with_modifier, BoxFuture, Capability, Context, Handler, HandlerResult, Modification,
    Modifier, ModifierId,
};
use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};
use tracing::Level;
use uuid::Uuid;

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A unique identifier for each request, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses a request ID from a header value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sink for log messages, injected into handlers through the means.
pub trait Log: Send + Sync + 'static {
    /// Logs `message` at `level`.
    fn log(&self, level: Level, message: &dyn fmt::Display);

    /// Logs at error level.
    fn error(&self, message: &dyn fmt::Display) {
        self.log(Level::ERROR, message);
    }

    /// Logs at warn level.
    fn warn(&self, message: &dyn fmt::Display) {
        self.log(Level::WARN, message);
    }

    /// Logs at info level.
    fn info(&self, message: &dyn fmt::Display) {
        self.log(Level::INFO, message);
    }

    /// Logs at debug level.
    fn debug(&self, message: &dyn fmt::Display) {
        self.log(Level::DEBUG, message);
    }

    /// Logs at trace level.
    fn trace(&self, message: &dyn fmt::Display) {
        self.log(Level::TRACE, message);
    }
}

/// Means holding the logger of a request.
#[derive(Clone)]
pub struct Logger(Arc<dyn Log>);

impl Logger {
    /// Wraps a log sink.
    pub fn new(log: impl Log) -> Self {
        Self(Arc::new(log))
    }
}

impl Deref for Logger {
    type Target = dyn Log;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// Logger emitting `tracing` events inside a span.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    span: tracing::Span,
}

impl TracingLogger {
    /// Logs within `span`.
    #[must_use]
    pub const fn new(span: tracing::Span) -> Self {
        Self { span }
    }

    /// Logs within a span describing one request.
    #[must_use]
    pub fn for_request(request_id: RequestId, http: Option<&HttpMeans>) -> Self {
        let span = match http {
            Some(http) => tracing::info_span!(
                "request",
                request_id = %request_id,
                http.method = %http.method(),
                http.path = %http.path(),
            ),
            None => tracing::info_span!("request", request_id = %request_id),
        };
        Self::new(span)
    }
}

impl Log for TracingLogger {
    fn log(&self, level: Level, message: &dyn fmt::Display) {
        let _entered = self.span.enter();
        if level == Level::ERROR {
            tracing::error!("{}", message);
        } else if level == Level::WARN {
            tracing::warn!("{}", message);
        } else if level == Level::INFO {
            tracing::info!("{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!("{}", message);
        } else {
            tracing::trace!("{}", message);
        }
    }
}

#[derive(Clone)]
enum LoggerSource {
    Tracing,
    Fixed(Logger),
}

struct LoggingModifier {
    id: ModifierId,
    source: LoggerSource,
    trust_incoming_id: bool,
}

impl LoggingModifier {
    fn request_id(&self, ctx: &Context, http: Option<&HttpMeans>) -> RequestId {
        if let Some(id) = ctx.get::<RequestId>() {
            return *id;
        }

        http.filter(|_| self.trust_incoming_id)
            .and_then(|http| http.header_str(REQUEST_ID_HEADER))
            .and_then(RequestId::parse)
            .unwrap_or_default()
    }
}

impl Modifier for LoggingModifier {
    fn id(&self) -> ModifierId {
        self.id
    }

    fn modification<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, HandlerResult<Modification>> {
        Box::pin(async move {
            if ctx.get::<Logger>().is_some() {
                return Ok(Modification::new());
            }

            let http = ctx.get::<HttpMeans>();
            let request_id = self.request_id(ctx, http);
            if let Some(http) = http {
                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    http.response()
                        .insert_header(HeaderName::from_static(REQUEST_ID_HEADER), value);
                }
            }

            let logger = match &self.source {
                LoggerSource::Tracing => Logger::new(TracingLogger::for_request(request_id, http)),
                LoggerSource::Fixed(logger) => logger.clone(),
            };

            Ok(Modification::new().with(logger).with(request_id))
        })
    }
}

/// Capability providing a [`Logger`] and a [`RequestId`].
///
/// If the context already has a logger, it is left in place. By default a
/// [`TracingLogger`] scoped to the request is created; [`Logging::log_by`]
/// derives a capability using a fixed logger instead.
#[derive(Clone)]
pub struct Logging {
    modifier: Arc<LoggingModifier>,
}

impl Logging {
    /// Returns the process-wide logging capability backed by `tracing`.
    ///
    /// All default instances share one identity. [`Logging::log_by`] and
    /// [`Logging::trust_incoming_request_id`] derive capabilities with their
    /// own.
    #[must_use]
    pub fn new() -> Self {
        static SHARED: OnceLock<Logging> = OnceLock::new();
        SHARED
            .get_or_init(|| Self::from_parts(LoggerSource::Tracing, false))
            .clone()
    }

    fn from_parts(source: LoggerSource, trust_incoming_id: bool) -> Self {
        Self {
            modifier: Arc::new(LoggingModifier {
                id: ModifierId::mint(),
                source,
                trust_incoming_id,
            }),
        }
    }

    /// Returns a new capability that uses `logger` for every request.
    #[must_use]
    pub fn log_by(&self, logger: impl Log) -> Self {
        Self::from_parts(
            LoggerSource::Fixed(Logger::new(logger)),
            self.modifier.trust_incoming_id,
        )
    }

    /// Returns a new capability that reuses valid incoming `x-request-id`
    /// headers instead of generating a fresh ID.
    #[must_use]
    pub fn trust_incoming_request_id(&self, trust: bool) -> Self {
        Self::from_parts(self.modifier.source.clone(), trust)
    }

    /// Returns the modifier id.
    #[must_use]
    pub fn id(&self) -> ModifierId {
        self.modifier.id
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logging")
            .field("id", &self.modifier.id)
            .field("trust_incoming_id", &self.modifier.trust_incoming_id)
            .finish_non_exhaustive()
    }
}

impl Capability for Logging {
    fn for_handler(&self, handler: Handler) -> Handler {
        with_modifier(self.modifier.clone(), handler)
    }
}

/// A logger that records messages in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<parking_lot::Mutex<Vec<(Level, String)>>>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().clone()
    }

    /// Returns the number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Log for MemoryLog {
    fn log(&self, level: Level, message: &dyn fmt::Display) {
        self.entries.lock().push((level, message.to_string()));
    }
}
