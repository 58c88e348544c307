//! The request processor: entry point of a handler chain.

use crate::context::Context;
use crate::error::HandlerResult;
use crate::handler::{BoxFuture, Handler};
use crate::means::Means;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type NextFn = dyn Fn(Handler, Context) -> BoxFuture<'static, HandlerResult<bool>> + Send + Sync;

/// Runs a handler over fresh per-request means.
///
/// The `next` strategy decides how the initial handler is invoked. The default
/// simply awaits [`Context::next`]; transports can substitute a strategy that,
/// for example, resolves as soon as the response is complete.
///
/// # Example
///
/// ```
/// use daedalus_core::{Context, Handler, Means, RequestProcessor};
///
/// # tokio_test::block_on(async {
/// let processor = RequestProcessor::new(Handler::new(|ctx: Context| async move {
///     ctx.complete();
///     Ok(())
/// }));
///
/// assert!(processor.process(Means::new()).await.unwrap());
/// # });
/// ```
#[derive(Clone)]
pub struct RequestProcessor {
    handler: Handler,
    next: Arc<NextFn>,
}

impl RequestProcessor {
    /// Creates a processor with the default `next` strategy.
    #[must_use]
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            next: Arc::new(|handler, ctx| Box::pin(async move { ctx.next(&handler).await })),
        }
    }

    /// Replaces the `next` strategy.
    #[must_use]
    pub fn with_next<F, Fut>(mut self, next: F) -> Self
    where
        F: Fn(Handler, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<bool>> + Send + 'static,
    {
        self.next = Arc::new(move |handler, ctx| Box::pin(next(handler, ctx)));
        self
    }

    /// Returns the initial handler.
    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Processes one request. Returns `Ok(true)` if a response was produced,
    /// or the error that escaped every handler.
    pub async fn process(&self, means: Means) -> HandlerResult<bool> {
        self.process_context(Context::root(means)).await
    }

    /// Processes one request starting from an already built root context.
    pub async fn process_context(&self, ctx: Context) -> HandlerResult<bool> {
        (self.next)(self.handler.clone(), ctx).await
    }
}

impl fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestProcessor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Marker(u32);

    #[tokio::test]
    async fn test_process_without_response() {
        let processor = RequestProcessor::new(Handler::noop());
        assert!(!processor.process(Means::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_process_sees_initial_means() {
        let processor = RequestProcessor::new(Handler::new(|ctx: Context| async move {
            if ctx.require::<Marker>()?.0 == 7 {
                ctx.complete();
            }
            Ok(())
        }));

        assert!(processor.process(Means::new().with(Marker(7))).await.unwrap());
    }

    #[tokio::test]
    async fn test_process_returns_escaped_error() {
        let processor = RequestProcessor::new(Handler::new(|_ctx| async {
            Err::<(), _>(StatusError::internal().into())
        }));
        assert!(processor.process(Means::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_custom_next_strategy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let processor = RequestProcessor::new(Handler::noop()).with_next(move |handler, ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                ctx.next(&handler).await?;
                Ok(true)
            }
        });

        assert!(processor.process(Means::new()).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
