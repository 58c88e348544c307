//! Per-request HTTP means: the request, its addresses and the response buffer.

use bytes::Bytes;
use daedalus_core::{HandlerError, StatusError};
use http::header::{AsHeaderName, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

/// Local and remote socket addresses of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestAddresses {
    /// Address the request was received on.
    pub local: Option<SocketAddr>,
    /// Address of the peer.
    pub remote: Option<SocketAddr>,
}

impl RequestAddresses {
    /// Creates addresses for a socket connection.
    #[must_use]
    pub const fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            local: Some(local),
            remote: Some(remote),
        }
    }
}

/// Raised when a second response is written for the same request.
#[derive(Debug, Error)]
#[error("Response already sent with status {status}")]
pub struct ResponseAlreadySent {
    /// Status of the response that was sent first.
    pub status: StatusCode,
}

impl From<ResponseAlreadySent> for HandlerError {
    fn from(error: ResponseAlreadySent) -> Self {
        Self::unexpected(error)
    }
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    sent: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            sent: false,
        }
    }
}

/// Response buffer shared by every context of a request.
///
/// Headers may be set at any time before the response is sent. The body is
/// written once, by [`ResponseSink::send`].
#[derive(Debug, Clone, Default)]
pub struct ResponseSink {
    state: Arc<Mutex<ResponseState>>,
}

impl ResponseSink {
    /// Creates an empty 200 response buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.state.lock().status
    }

    /// Sets a header, replacing existing values.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.state.lock().headers.insert(name, value);
    }

    /// Adds a header value, keeping existing values.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.state.lock().headers.append(name, value);
    }

    /// Returns the first value of a header.
    pub fn header(&self, name: impl AsHeaderName) -> Option<HeaderValue> {
        self.state.lock().headers.get(name).cloned()
    }

    /// Returns a copy of the headers.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.state.lock().headers.clone()
    }

    /// Returns `true` once the response has been sent.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.state.lock().sent
    }

    /// Writes the response.
    ///
    /// `Content-Length` is always the size of `body`; when `omit_body` is set
    /// (a `HEAD` request) the bytes themselves are dropped.
    pub fn send(
        &self,
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
        omit_body: bool,
    ) -> Result<(), ResponseAlreadySent> {
        let mut state = self.state.lock();
        if state.sent {
            return Err(ResponseAlreadySent {
                status: state.status,
            });
        }

        state.status = status;
        if let Some(content_type) = content_type {
            state.headers.insert(CONTENT_TYPE, content_type);
        }
        state
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        state.body = if omit_body { Bytes::new() } else { body };
        state.sent = true;
        Ok(())
    }

    /// Returns the response as buffered so far.
    #[must_use]
    pub fn to_response(&self) -> Response<Bytes> {
        let state = self.state.lock();
        let mut response = Response::new(state.body.clone());
        *response.status_mut() = state.status;
        *response.headers_mut() = state.headers.clone();
        response
    }
}

/// The HTTP exchange of one request.
#[derive(Debug, Clone)]
pub struct HttpMeans {
    request: Arc<Request<Bytes>>,
    response: ResponseSink,
    addresses: RequestAddresses,
}

impl HttpMeans {
    /// Creates the means for a request with a fully collected body.
    #[must_use]
    pub fn new(request: Request<Bytes>, addresses: RequestAddresses) -> Self {
        Self {
            request: Arc::new(request),
            response: ResponseSink::new(),
            addresses,
        }
    }

    /// Returns the request.
    #[must_use]
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Returns a request header as a string, if present and valid.
    pub fn header_str(&self, name: impl AsHeaderName) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Returns the parsed `Content-Type`, if present.
    ///
    /// An unparseable value is reported as 415.
    pub fn content_type(&self) -> Result<Option<mime::Mime>, StatusError> {
        let Some(value) = self.request.headers().get(CONTENT_TYPE) else {
            return Ok(None);
        };

        value
            .to_str()
            .ok()
            .and_then(|v| v.parse::<mime::Mime>().ok())
            .map(Some)
            .ok_or_else(|| {
                StatusError::unsupported_media_type()
                    .with_details(String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
    }

    /// Returns `true` for `HEAD` requests.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.request.method() == Method::HEAD
    }

    /// Returns the response buffer.
    #[must_use]
    pub fn response(&self) -> &ResponseSink {
        &self.response
    }

    /// Returns the socket addresses.
    #[must_use]
    pub const fn addresses(&self) -> RequestAddresses {
        self.addresses
    }
}
