//! In-memory test client.

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;
use bytes::Bytes;
use daedalus_core::Handler;
use daedalus_http::RequestAddresses;
use daedalus_server::HttpListener;
use http::Method;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

const LOCAL_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 80);
const REMOTE_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50_000);

/// Sends requests straight to an [`HttpListener`], without sockets.
///
/// Requests go through the same chain the server uses: logging, rendering,
/// the error path and the default 404.
///
/// # Example
///
/// ```
/// use daedalus_core::{Context, Handler};
/// use daedalus_http::Renderer;
/// use daedalus_test::TestClient;
/// use http::StatusCode;
///
/// # tokio_test::block_on(async {
/// let client = TestClient::new(Handler::new(|ctx: Context| async move {
///     ctx.require::<Renderer>()?.render_text(StatusCode::OK, "pong")
/// }));
///
/// client
///     .get("/ping")
///     .send()
///     .await
///     .unwrap()
///     .assert_status(StatusCode::OK)
///     .assert_text("pong");
/// # });
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    listener: Arc<HttpListener>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `handler` with default listener settings.
    pub fn new(handler: Handler) -> Self {
        Self::from_listener(HttpListener::builder(handler).build())
    }

    /// Creates a client for a configured listener.
    pub fn from_listener(listener: HttpListener) -> Self {
        Self {
            listener: Arc::new(listener),
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a HEAD request.
    pub fn head(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::HEAD, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let builder = self
            .default_headers
            .iter()
            .fold(TestRequestBuilder::new(method, uri), |builder, (name, value)| {
                builder.header(name, value)
            });
        TestClientRequest {
            client: self,
            builder,
        }
    }

    /// Sends an already built request.
    pub async fn send(&self, request: TestRequest) -> TestResponse {
        let addresses = RequestAddresses::new(LOCAL_ADDR, request.remote.unwrap_or(REMOTE_ADDR));
        let response = self
            .listener
            .dispatch(request.into_http_request(), addresses)
            .await;
        TestResponse::from_response(response)
    }
}

/// A request being built for a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets the Accept header.
    pub fn accept(mut self, accept: impl AsRef<str>) -> Self {
        self.builder = self.builder.accept(accept);
        self
    }

    /// Sets the Accept-Language header.
    pub fn accept_language(mut self, languages: impl AsRef<str>) -> Self {
        self.builder = self.builder.accept_language(languages);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sets a URL-encoded form body.
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.form(value);
        self
    }

    /// Sets the peer address handlers see.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.builder = self.builder.remote_addr(addr);
        self
    }

    /// Sends the request.
    ///
    /// # Errors
    ///
    /// Fails only if the request could not be built.
    pub async fn send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        Ok(self.client.send(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::Context;
    use daedalus_http::{HttpMeans, Renderer, REQUEST_ID_HEADER};
    use http::StatusCode;

    fn echo() -> Handler {
        Handler::new(|ctx: Context| async move {
            let http = ctx.require::<HttpMeans>()?;
            let text = format!(
                "{} {} {}",
                http.method(),
                http.path(),
                http.header_str("x-tenant").unwrap_or("-")
            );
            ctx.require::<Renderer>()?.render_text(StatusCode::OK, text)
        })
    }

    #[tokio::test]
    async fn test_get() {
        let client = TestClient::new(echo());
        client
            .get("/users")
            .send()
            .await
            .unwrap()
            .assert_status(StatusCode::OK)
            .assert_text("GET /users -");
    }

    #[tokio::test]
    async fn test_default_headers() {
        let client = TestClient::new(echo()).with_default_header("x-tenant", "acme");
        let response = client.post("/").send().await.unwrap();
        response.assert_text("POST / acme");
        assert!(response.header(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_unanswered_request_is_404() {
        let client = TestClient::new(Handler::noop());
        client
            .get("/nothing")
            .send()
            .await
            .unwrap()
            .assert_status(StatusCode::NOT_FOUND)
            .assert_error_code("NOT_FOUND");
    }

    #[tokio::test]
    async fn test_build_error_surfaces() {
        let client = TestClient::new(Handler::noop());
        let result = client.get("/").header("x-bad", "line\nbreak").send().await;
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn test_remote_addr() {
        let client = TestClient::new(Handler::new(|ctx: Context| async move {
            let remote = ctx.require::<HttpMeans>()?.addresses().remote;
            ctx.require::<Renderer>()?
                .render_text(StatusCode::OK, format!("{remote:?}"))
        }));

        let addr: SocketAddr = "10.1.2.3:4567".parse().unwrap();
        client
            .get("/")
            .remote_addr(addr)
            .send()
            .await
            .unwrap()
            .assert_text("Some(10.1.2.3:4567)");
    }
}
