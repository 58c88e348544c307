//! Handlers and their sequential composition.

use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};
use crate::means::Modification;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type HandlerFn = dyn Fn(Context) -> BoxFuture<'static, HandlerResult<()>> + Send + Sync;

/// An asynchronous unit of request processing.
///
/// A handler either responds, delegates to another handler through
/// [`Context::next`] / [`Context::next_with`], or does nothing. Whether a
/// response was produced is read from the context's completion flag, not from
/// the handler's return value.
///
/// # Example
///
/// ```
/// use daedalus_core::{Context, Handler, Means};
///
/// # tokio_test::block_on(async {
/// let respond = Handler::new(|ctx: Context| async move {
///     ctx.complete();
///     Ok(())
/// });
///
/// let ctx = Context::root(Means::new());
/// assert!(ctx.next(&respond).await.unwrap());
/// # });
/// ```
#[derive(Clone)]
pub struct Handler {
    f: Arc<HandlerFn>,
}

impl Handler {
    /// Creates a handler from an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    /// A handler that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|_ctx| async { Ok(()) })
    }

    /// Invokes the handler.
    pub fn call(&self, ctx: Context) -> BoxFuture<'static, HandlerResult<()>> {
        (self.f)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

/// Composes handlers into one that tries each in order.
///
/// A single handler is returned as-is. Otherwise the composite delegates to
/// each handler in turn with the same context, stopping as soon as one
/// produces the response or fails.
pub fn request_handler(handlers: impl IntoIterator<Item = Handler>) -> Handler {
    let mut handlers: Vec<Handler> = handlers.into_iter().collect();
    if handlers.len() == 1 {
        return handlers.swap_remove(0);
    }

    let handlers: Arc<[Handler]> = handlers.into();
    Handler::new(move |ctx| {
        let handlers = Arc::clone(&handlers);
        async move {
            for handler in handlers.iter() {
                if ctx.next(handler).await? {
                    break;
                }
            }
            Ok(())
        }
    })
}

/// Means carrying the error caught by [`dispatch_error`].
#[derive(Debug, Clone)]
pub struct ErrorMeans {
    error: Arc<HandlerError>,
}

impl ErrorMeans {
    /// Wraps an error.
    #[must_use]
    pub fn new(error: HandlerError) -> Self {
        Self {
            error: Arc::new(error),
        }
    }

    /// Returns the caught error.
    #[must_use]
    pub fn error(&self) -> &HandlerError {
        &self.error
    }
}

/// Runs `primary`; if it fails, runs `on_error` with the error in its means.
///
/// The caught error is passed as a plain [`Modification`] holding
/// [`ErrorMeans`]. Failures of `on_error` propagate.
pub fn dispatch_error(on_error: Handler, primary: Handler) -> Handler {
    Handler::new(move |ctx| {
        let on_error = on_error.clone();
        let primary = primary.clone();
        async move {
            if let Err(error) = ctx.next(&primary).await {
                let modification = Modification::new().with(ErrorMeans::new(error));
                ctx.next_with(&on_error, modification).await?;
            }
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusError;
    use crate::means::Means;
    use http::StatusCode;
    use std::sync::Mutex;

    fn tracking(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>, respond: bool) -> Handler {
        Handler::new(move |ctx: Context| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
                if respond {
                    ctx.complete();
                }
                Ok(())
            }
        })
    }

    fn failing(status: StatusCode) -> Handler {
        Handler::new(move |_ctx| async move { Err::<(), _>(StatusError::new(status).into()) })
    }

    #[tokio::test]
    async fn test_sequence_runs_in_order_until_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = request_handler([
            tracking("h1", log.clone(), false),
            tracking("h2", log.clone(), true),
            tracking("h3", log.clone(), true),
        ]);

        let responded = Context::root(Means::new()).next(&handler).await.unwrap();
        assert!(responded);
        assert_eq!(*log.lock().unwrap(), vec!["h1", "h2"]);
    }

    #[tokio::test]
    async fn test_sequence_exhausted_without_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = request_handler([
            tracking("h1", log.clone(), false),
            tracking("h2", log.clone(), false),
        ]);

        let responded = Context::root(Means::new()).next(&handler).await.unwrap();
        assert!(!responded);
        assert_eq!(*log.lock().unwrap(), vec!["h1", "h2"]);
    }

    #[tokio::test]
    async fn test_sequence_stops_on_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = request_handler([
            tracking("h1", log.clone(), false),
            failing(StatusCode::CONFLICT),
            tracking("h3", log.clone(), true),
        ]);

        let error = Context::root(Means::new()).next(&handler).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(*log.lock().unwrap(), vec!["h1"]);
    }

    #[tokio::test]
    async fn test_single_handler_returned_as_is() {
        let only = Handler::noop();
        let composed = request_handler([only.clone()]);
        assert!(Arc::ptr_eq(&only.f, &composed.f));
    }

    #[tokio::test]
    async fn test_dispatch_error_passes_error_means() {
        let seen = Arc::new(Mutex::new(None));
        let on_error = {
            let seen = seen.clone();
            Handler::new(move |ctx: Context| {
                let seen = seen.clone();
                async move {
                    let caught = ctx.require::<ErrorMeans>()?;
                    *seen.lock().unwrap() = Some(caught.error().status_code());
                    ctx.complete();
                    Ok(())
                }
            })
        };

        let handler = dispatch_error(on_error, failing(StatusCode::IM_A_TEAPOT));
        let responded = Context::root(Means::new()).next(&handler).await.unwrap();

        assert!(responded);
        assert_eq!(*seen.lock().unwrap(), Some(StatusCode::IM_A_TEAPOT));
    }

    #[tokio::test]
    async fn test_dispatch_error_skips_on_success() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = dispatch_error(
            tracking("on_error", log.clone(), true),
            tracking("primary", log.clone(), true),
        );

        Context::root(Means::new()).next(&handler).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_dispatch_error_propagates_handler_failure() {
        let handler = dispatch_error(
            failing(StatusCode::SERVICE_UNAVAILABLE),
            failing(StatusCode::BAD_REQUEST),
        );

        let error = Context::root(Means::new()).next(&handler).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
