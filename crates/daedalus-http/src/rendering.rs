//! Response rendering.
//!
//! The [`Rendering`] capability adds a [`Renderer`] to the means. Once engaged,
//! the renderer is the only thing that writes response bytes: it sets
//! `Content-Length`, drops the body of `HEAD` responses and marks the request
//! as complete.

use crate::exchange::HttpMeans;
use bytes::Bytes;
use daedalus_core::{
    with_modifier, BoxFuture, Capability, Completion, Context, Handler, HandlerError,
    HandlerResult, Modification, Modifier, ModifierId,
};
use http::header::HeaderValue;
use http::StatusCode;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

const TEXT_HTML: &str = "text/html; charset=utf-8";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Writes the response of a request.
#[derive(Debug, Clone)]
pub struct Renderer {
    http: HttpMeans,
    completion: Completion,
}

impl Renderer {
    /// Creates a renderer over a request's exchange.
    #[must_use]
    pub fn new(http: HttpMeans, completion: Completion) -> Self {
        Self { http, completion }
    }

    /// Creates a renderer for the request of `ctx`.
    pub fn for_context(ctx: &Context) -> HandlerResult<Self> {
        let http = ctx.require::<HttpMeans>()?.clone();
        Ok(Self::new(http, ctx.completion().clone()))
    }

    /// Sends `body` with the given status and content type.
    pub fn render_body(
        &self,
        status: StatusCode,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> HandlerResult<()> {
        let content_type = HeaderValue::from_str(content_type).map_err(HandlerError::unexpected)?;
        self.send(status, Some(content_type), body.into())
    }

    /// Sends an HTML document.
    pub fn render_html(&self, status: StatusCode, html: impl Into<String>) -> HandlerResult<()> {
        self.render_body(status, TEXT_HTML, html.into())
    }

    /// Sends plain text.
    pub fn render_text(&self, status: StatusCode, text: impl Into<String>) -> HandlerResult<()> {
        self.render_body(status, TEXT_PLAIN, text.into())
    }

    /// Serializes `value` as JSON and sends it.
    pub fn render_json<T: Serialize + ?Sized>(
        &self,
        status: StatusCode,
        value: &T,
    ) -> HandlerResult<()> {
        let body = serde_json::to_vec(value).map_err(HandlerError::unexpected)?;
        self.render_body(status, APPLICATION_JSON, body)
    }

    /// Sends a response without a body.
    pub fn render_empty(&self, status: StatusCode) -> HandlerResult<()> {
        self.send(status, None, Bytes::new())
    }

    fn send(
        &self,
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    ) -> HandlerResult<()> {
        self.http
            .response()
            .send(status, content_type, body, self.http.is_head())?;
        self.completion.complete();
        Ok(())
    }
}

struct RenderingModifier {
    id: ModifierId,
}

impl Modifier for RenderingModifier {
    fn id(&self) -> ModifierId {
        self.id
    }

    fn modification<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, HandlerResult<Modification>> {
        Box::pin(async move { Ok(Modification::new().with(Renderer::for_context(ctx)?)) })
    }
}

/// Capability providing a [`Renderer`].
///
/// # Example
///
/// ```
/// use daedalus_core::{Capability, Context, Handler};
/// use daedalus_http::{Rendering, Renderer};
/// use http::StatusCode;
///
/// let hello = Rendering::new().for_handler(Handler::new(|ctx: Context| async move {
///     ctx.require::<Renderer>()?.render_html(StatusCode::OK, "<p>Hello</p>")
/// }));
/// ```
#[derive(Clone)]
pub struct Rendering {
    modifier: Arc<RenderingModifier>,
}

impl Rendering {
    /// Returns the process-wide rendering capability.
    ///
    /// Every instance shares one identity, so wrapping a handler that is
    /// already rendered does not add a second [`Renderer`].
    #[must_use]
    pub fn new() -> Self {
        static SHARED: OnceLock<Rendering> = OnceLock::new();
        SHARED
            .get_or_init(|| Self {
                modifier: Arc::new(RenderingModifier {
                    id: ModifierId::mint(),
                }),
            })
            .clone()
    }

    /// Returns the modifier id.
    #[must_use]
    pub fn id(&self) -> ModifierId {
        self.modifier.id
    }
}

impl Default for Rendering {
    fn default() -> Self {
        Self::new()
    }
}

impl Capability for Rendering {
    fn for_handler(&self, handler: Handler) -> Handler {
        with_modifier(self.modifier.clone(), handler)
    }
}
