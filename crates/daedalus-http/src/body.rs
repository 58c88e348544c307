//! Request body parsing capabilities.
//!
//! [`JsonParsing`] and [`FormDecoding`] read the collected request body and add
//! it to the means as [`RequestBody<T>`]. Both check `Content-Type` first:
//!
//! | Content-Type | Outcome |
//! |---|---|
//! | absent, empty body | no [`RequestBody`] added |
//! | absent, non-empty body | parsed |
//! | recognized | parsed; failure is 400 with details `Malformed JSON` / `Malformed form` |
//! | anything else | 415 |

use crate::exchange::HttpMeans;
use daedalus_core::{
    with_modifier, BoxFuture, Capability, Context, Handler, HandlerResult, Modification,
    Modifier, ModifierId, StatusError,
};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Default maximum body size accepted by the parsers (1 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Details reported when a JSON body cannot be parsed.
pub const MALFORMED_JSON: &str = "Malformed JSON";

/// Details reported when a form body cannot be decoded.
pub const MALFORMED_FORM: &str = "Malformed form";

/// A parsed request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody<T>(pub T);

impl<T> RequestBody<T> {
    /// Consumes the wrapper and returns the body.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for RequestBody<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

type ParseFn<T> = dyn Fn(&[u8]) -> HandlerResult<T> + Send + Sync;

/// Shared machinery of the two parsers.
struct BodyModifier<T> {
    id: ModifierId,
    kind: BodyKind,
    limit: usize,
    parse: Arc<ParseFn<T>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

impl BodyKind {
    fn accepts(self, mime: &mime::Mime) -> bool {
        match self {
            Self::Json => {
                (mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON)
                    || mime.suffix() == Some(mime::JSON)
            }
            Self::Form => mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str(),
        }
    }
}

impl<T: Send + Sync + 'static> Modifier for BodyModifier<T> {
    fn id(&self) -> ModifierId {
        self.id
    }

    fn modification<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, HandlerResult<Modification>> {
        Box::pin(async move {
            let http = ctx.require::<HttpMeans>()?;
            let body = http.body();

            match http.content_type()? {
                Some(mime) if !self.kind.accepts(&mime) => {
                    return Err(StatusError::unsupported_media_type()
                        .with_details(mime.essence_str().to_string())
                        .into());
                }
                None if body.is_empty() => return Ok(Modification::new()),
                _ => {}
            }

            if body.len() > self.limit {
                return Err(StatusError::payload_too_large()
                    .with_details(format!(
                        "Body of {} bytes exceeds the limit of {} bytes",
                        body.len(),
                        self.limit
                    ))
                    .into());
            }

            let value = (self.parse)(&body[..])?;
            Ok(Modification::new().with(RequestBody(value)))
        })
    }
}

fn json_parser<T: DeserializeOwned>() -> Arc<ParseFn<T>> {
    Arc::new(|body: &[u8]| -> HandlerResult<T> {
        serde_json::from_slice(body).map_err(|e| {
            StatusError::bad_request()
                .with_details(MALFORMED_JSON)
                .with_cause(e)
                .into()
        })
    })
}

fn form_parser<T: DeserializeOwned>() -> Arc<ParseFn<T>> {
    Arc::new(|body: &[u8]| -> HandlerResult<T> {
        serde_urlencoded::from_bytes(body).map_err(|e| {
            StatusError::bad_request()
                .with_details(MALFORMED_FORM)
                .with_cause(e)
                .into()
        })
    })
}

fn mapped<T, U, F>(parse: Arc<ParseFn<T>>, f: F) -> Arc<ParseFn<U>>
where
    T: 'static,
    U: 'static,
    F: Fn(T) -> HandlerResult<U> + Send + Sync + 'static,
{
    Arc::new(move |body: &[u8]| -> HandlerResult<U> { parse(body).and_then(&f) })
}

macro_rules! body_capability {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $parser:ident, $default:ty) => {
        $(#[$meta])*
        pub struct $name<T = $default> {
            modifier: Arc<BodyModifier<T>>,
        }

        impl $name {
            /// Creates a parser producing the default body type.
            #[must_use]
            pub fn new() -> Self {
                Self::typed()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T: Send + Sync + 'static> $name<T> {
            /// Creates a parser deserializing into `T`.
            #[must_use]
            pub fn typed() -> Self
            where
                T: DeserializeOwned,
            {
                Self::from_parts(ModifierId::mint(), DEFAULT_MAX_BODY_SIZE, $parser::<T>())
            }

            fn from_parts(id: ModifierId, limit: usize, parse: Arc<ParseFn<T>>) -> Self {
                Self {
                    modifier: Arc::new(BodyModifier {
                        id,
                        kind: $kind,
                        limit,
                        parse,
                    }),
                }
            }

            /// Returns a new parser with a different size limit.
            #[must_use]
            pub fn with_limit(&self, limit: usize) -> Self {
                Self::from_parts(ModifierId::mint(), limit, self.modifier.parse.clone())
            }

            /// Returns a new parser whose body is transformed by `f`.
            #[must_use]
            pub fn map<U, F>(&self, f: F) -> $name<U>
            where
                U: Send + Sync + 'static,
                F: Fn(T) -> HandlerResult<U> + Send + Sync + 'static,
            {
                $name::<U>::from_parts(
                    ModifierId::mint(),
                    self.modifier.limit,
                    mapped(self.modifier.parse.clone(), f),
                )
            }

            /// Returns the modifier id.
            #[must_use]
            pub fn id(&self) -> ModifierId {
                self.modifier.id
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    modifier: Arc::clone(&self.modifier),
                }
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.modifier.id)
                    .field("limit", &self.modifier.limit)
                    .finish()
            }
        }

        impl<T: Send + Sync + 'static> Capability for $name<T> {
            fn for_handler(&self, handler: Handler) -> Handler {
                with_modifier(self.modifier.clone(), handler)
            }
        }
    };
}

body_capability!(
    /// Capability parsing JSON request bodies into [`RequestBody<T>`].
    ///
    /// Accepts `application/json` and any `+json` media type.
    ///
    /// # Example
    ///
    /// ```
    /// use daedalus_core::{Capability, Context, Handler};
    /// use daedalus_http::{JsonParsing, RequestBody};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Note {
    ///     text: String,
    /// }
    ///
    /// let create = JsonParsing::<Note>::typed().for_handler(Handler::new(|ctx: Context| async move {
    ///     let note = ctx.require::<RequestBody<Note>>()?;
    ///     assert!(!note.text.is_empty());
    ///     Ok(())
    /// }));
    /// ```
    JsonParsing,
    BodyKind::Json,
    json_parser,
    serde_json::Value
);

body_capability!(
    /// Capability decoding `application/x-www-form-urlencoded` bodies into
    /// [`RequestBody<T>`].
    ///
    /// The default body type keeps fields in submission order.
    FormDecoding,
    BodyKind::Form,
    form_parser,
    IndexMap<String, String>
);

/// Returns the parsed body of `ctx`, if a parser added one.
pub fn request_body<T: Any>(ctx: &Context) -> Option<&T> {
    ctx.get::<RequestBody<T>>().map(|body| &body.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::RequestAddresses;
    use bytes::Bytes;
    use daedalus_core::{HandlerError, Means};
    use http::header::CONTENT_TYPE;
    use http::{Method, Request, StatusCode};
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Note {
        text: String,
    }

    fn ctx(content_type: Option<&str>, body: &'static [u8]) -> Context {
        let mut builder = Request::builder().method(Method::POST).uri("/notes");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let http = HttpMeans::new(
            builder.body(Bytes::from_static(body)).unwrap(),
            RequestAddresses::default(),
        );
        Context::root(Means::new().with(http))
    }

    async fn run<T, C>(capability: C, ctx: Context) -> Result<Option<T>, HandlerError>
    where
        T: Clone + Send + Sync + 'static,
        C: Capability,
    {
        let seen = Arc::new(Mutex::new(None));
        let target = {
            let seen = seen.clone();
            Handler::new(move |ctx: Context| {
                let seen = seen.clone();
                async move {
                    *seen.lock().unwrap() = request_body::<T>(&ctx).cloned();
                    Ok(())
                }
            })
        };
        ctx.next(&capability.for_handler(target)).await?;
        let body = seen.lock().unwrap().take();
        Ok(body)
    }

    #[tokio::test]
    async fn test_json_body_parsed() {
        let body = run::<Note, _>(
            JsonParsing::<Note>::typed(),
            ctx(Some("application/json"), br#"{"text":"hello"}"#),
        )
        .await
        .unwrap();
        assert_eq!(
            body,
            Some(Note {
                text: "hello".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_json_default_value() {
        let body = run::<serde_json::Value, _>(
            JsonParsing::new(),
            ctx(Some("application/vnd.api+json"), br#"{"text":"hello"}"#),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(body["text"], "hello");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let error = run::<Note, _>(
            JsonParsing::<Note>::typed(),
            ctx(Some("application/json"), b"{\"text\":"),
        )
        .await
        .unwrap_err();

        let status = error.as_status().unwrap();
        assert_eq!(status.status(), StatusCode::BAD_REQUEST);
        assert_eq!(status.details(), Some(MALFORMED_JSON));
        assert!(status.cause().is_some());
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_unsupported() {
        let error = run::<Note, _>(
            JsonParsing::<Note>::typed(),
            ctx(Some("text/csv"), b"text\nhello"),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_missing_content_type_and_body_skips_parsing() {
        let body = run::<Note, _>(JsonParsing::<Note>::typed(), ctx(None, b""))
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_missing_content_type_still_parses() {
        let body = run::<Note, _>(JsonParsing::<Note>::typed(), ctx(None, br#"{"text":"x"}"#))
            .await
            .unwrap();
        assert!(body.is_some());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let error = run::<Note, _>(
            JsonParsing::<Note>::typed().with_limit(4),
            ctx(Some("application/json"), br#"{"text":"hello"}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_map_transforms_body() {
        let shout = JsonParsing::<Note>::typed().map(|note| Ok(note.text.to_uppercase()));
        let body = run::<String, _>(
            shout,
            ctx(Some("application/json"), br#"{"text":"hello"}"#),
        )
        .await
        .unwrap();
        assert_eq!(body.as_deref(), Some("HELLO"));
    }

    #[tokio::test]
    async fn test_form_decoding() {
        let body = run::<IndexMap<String, String>, _>(
            FormDecoding::new(),
            ctx(
                Some("application/x-www-form-urlencoded"),
                b"b=2&a=hello+world",
            ),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(body.get_index(0), Some((&"b".to_string(), &"2".to_string())));
        assert_eq!(body["a"], "hello world");
    }

    #[tokio::test]
    async fn test_malformed_form_is_bad_request() {
        let error = run::<Note, _>(
            FormDecoding::<Note>::typed(),
            ctx(Some("application/x-www-form-urlencoded"), b"other=1"),
        )
        .await
        .unwrap_err();
        assert_eq!(error.as_status().unwrap().details(), Some(MALFORMED_FORM));
    }

    #[tokio::test]
    async fn test_form_rejects_json() {
        let error = run::<Note, _>(
            FormDecoding::<Note>::typed(),
            ctx(Some("application/json"), br#"{"text":"x"}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
