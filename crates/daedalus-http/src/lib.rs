//! # Daedalus HTTP
//!
//! HTTP capabilities built on the Daedalus context chain.
//!
//! - [`HttpMeans`] - The request, its addresses and the shared response buffer
//! - [`Rendering`] / [`Renderer`] - Writes responses, sets `Content-Length`, honors `HEAD`
//! - [`JsonParsing`] / [`FormDecoding`] - Parse request bodies into [`RequestBody`]
//! - [`Logging`] / [`Logger`] - Per-request logger and [`RequestId`]
//! - [`dispatch_by_accepted`] / [`dispatch_by_language`] - Content negotiation
//! - [`Routing`] / [`dispatch_by_pattern`] / [`dispatch_by_method`] - Routing
//! - [`render_http_error`] - Error path rendering a JSON envelope

#![doc(html_root_url = "https://docs.rs/daedalus-http/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod errors;
mod exchange;
mod logging;
mod negotiation;
mod rendering;
mod routing;

pub use body::{
    request_body, FormDecoding, JsonParsing, RequestBody, DEFAULT_MAX_BODY_SIZE, MALFORMED_FORM,
    MALFORMED_JSON,
};
pub use errors::{render_http_error, ErrorRenderingOptions};
pub use exchange::{HttpMeans, RequestAddresses, ResponseAlreadySent, ResponseSink};
pub use logging::{
    Log, Logger, Logging, MemoryLog, RequestId, TracingLogger, REQUEST_ID_HEADER,
};
pub use negotiation::{
    dispatch_by_accepted, dispatch_by_language, parse_quality_list, preferred_language,
    preferred_media_type, AcceptedLanguage, AcceptedMediaType, QualityItem,
};
pub use rendering::{Renderer, Rendering};
pub use routing::{
    dispatch_by_method, dispatch_by_pattern, Pattern, PatternError, RouteMeans, Routing,
};
