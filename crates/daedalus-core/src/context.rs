//! The immutable context chain and its delegation agent.
//!
//! Every delegation step either reuses the current [`Context`] or derives a
//! child that points back at it. A child holds a merged copy of its parent's
//! means and, when it was produced by a modifier, that modifier. All contexts
//! of one request share a single [`Completion`] flag.

use crate::error::{HandlerError, HandlerResult};
use crate::handler::Handler;
use crate::means::{Means, Modification};
use crate::modifier::{Extension, Modifier, ModifierId};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Per-request response-completion flag.
///
/// Set exactly once, by whoever finishes the response. Cloning shares the flag.
#[derive(Clone, Default)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

#[derive(Default)]
struct CompletionInner {
    done: AtomicBool,
    notify: Notify,
}

impl Completion {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Returns `true` only for the call that set it.
    pub fn complete(&self) -> bool {
        let first = !self.inner.done.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Returns `true` once the flag is set.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// Waits until the flag is set.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_completed() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("done", &self.is_completed())
            .finish()
    }
}

/// A request-processing context: means plus the agent that extends them.
///
/// Cheap to clone. Never mutated after construction.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    means: Means,
    parent: Option<Context>,
    modifier: Option<Arc<dyn Modifier>>,
    completion: Completion,
}

impl Context {
    /// Creates the root context of a request.
    #[must_use]
    pub fn root(means: Means) -> Self {
        Self::with_completion(means, Completion::new())
    }

    /// Creates a root context sharing an existing completion flag.
    #[must_use]
    pub fn with_completion(means: Means, completion: Completion) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                means,
                parent: None,
                modifier: None,
                completion,
            }),
        }
    }

    /// Returns the means of this context.
    #[must_use]
    pub fn means(&self) -> &Means {
        &self.inner.means
    }

    /// Returns the means value of type `T`, if present.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.inner.means.get::<T>()
    }

    /// Returns the means value of type `T`, or an unexpected error naming the
    /// missing type.
    pub fn require<T: Any>(&self) -> HandlerResult<&T> {
        self.get::<T>().ok_or_else(|| {
            HandlerError::unexpected(anyhow::anyhow!(
                "Means {} is not available in this context",
                type_name::<T>()
            ))
        })
    }

    /// Returns the context this one was derived from.
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// Returns the shared completion flag.
    #[must_use]
    pub fn completion(&self) -> &Completion {
        &self.inner.completion
    }

    /// Marks the response as complete. Returns `true` for the first caller.
    pub fn complete(&self) -> bool {
        self.inner.completion.complete()
    }

    /// Returns `true` once the response has been completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.completion.is_completed()
    }

    /// Returns the context at which the modifier `id` was applied, walking
    /// from this context towards the root.
    #[must_use]
    pub fn modified_by(&self, id: ModifierId) -> Option<Self> {
        self.ancestry()
            .find(|ctx| ctx.inner.modifier.as_ref().is_some_and(|m| m.id() == id))
            .cloned()
    }

    /// Returns the modifiers applied along this chain, most recent first.
    #[must_use]
    pub fn applied_modifiers(&self) -> Vec<Arc<dyn Modifier>> {
        self.ancestry()
            .filter_map(|ctx| ctx.inner.modifier.clone())
            .collect()
    }

    /// Invokes `handler` with this context.
    ///
    /// Returns `Ok(true)` if the response was completed by the time the
    /// handler returned. Handler errors propagate unchanged.
    pub async fn next(&self, handler: &Handler) -> HandlerResult<bool> {
        handler.call(self.clone()).await?;
        Ok(self.is_completed())
    }

    /// Invokes `handler` with this context extended by `extension`.
    ///
    /// A plain [`Modification`] always derives a child context. A modifier
    /// that was already applied in this chain is skipped and `handler` runs
    /// with the current context.
    pub async fn next_with(
        &self,
        handler: &Handler,
        extension: impl Into<Extension>,
    ) -> HandlerResult<bool> {
        match extension.into() {
            Extension::Modification(modification) => {
                let child = self.derive(modification, None);
                child.next(handler).await
            }
            Extension::Modifier(modifier) => {
                if self.modified_by(modifier.id()).is_some() {
                    tracing::trace!(modifier = ?modifier.id(), "Modifier already applied");
                    return self.next(handler).await;
                }

                let modification = modifier.modification(self).await?;
                let child = self.derive(modification, Some(modifier));
                child.next(handler).await
            }
        }
    }

    fn derive(&self, modification: Modification, modifier: Option<Arc<dyn Modifier>>) -> Self {
        let modification = self
            .applied_modifiers()
            .iter()
            .fold(modification, |next, applied| applied.modify_next(self, next));

        Self {
            inner: Arc::new(ContextInner {
                means: self.inner.means.merged(modification),
                parent: Some(self.clone()),
                modifier,
                completion: self.inner.completion.clone(),
            }),
        }
    }

    fn ancestry(&self) -> Ancestry<'_> {
        Ancestry {
            current: Some(self),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("means", &self.inner.means)
            .field("depth", &self.ancestry().count())
            .field(
                "modifier",
                &self.inner.modifier.as_ref().map(|m| m.id()),
            )
            .field("completed", &self.is_completed())
            .finish()
    }
}

struct Ancestry<'a> {
    current: Option<&'a Context>,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a Context;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.parent();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxFuture;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, PartialEq)]
    struct Depth(u32);

    #[derive(Debug, PartialEq)]
    struct Label(&'static str);

    struct Counting {
        id: ModifierId,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: ModifierId::mint(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Modifier for Counting {
        fn id(&self) -> ModifierId {
            self.id
        }

        fn modification<'a>(
            &'a self,
            ctx: &'a Context,
        ) -> BoxFuture<'a, HandlerResult<Modification>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let depth = ctx.get::<Depth>().map_or(0, |d| d.0);
                Ok(Modification::new().with(Depth(depth + 1)))
            })
        }
    }

    struct Relabel {
        id: ModifierId,
        label: &'static str,
    }

    impl Modifier for Relabel {
        fn id(&self) -> ModifierId {
            self.id
        }

        fn modification<'a>(
            &'a self,
            _ctx: &'a Context,
        ) -> BoxFuture<'a, HandlerResult<Modification>> {
            Box::pin(async { Ok(Modification::new()) })
        }

        fn modify_next(&self, _ctx: &Context, mut next: Modification) -> Modification {
            if next.contains::<Label>() {
                next.set(Label(self.label));
            }
            next
        }
    }

    fn capture(slot: Arc<std::sync::Mutex<Option<Context>>>) -> Handler {
        Handler::new(move |ctx| {
            let slot = slot.clone();
            async move {
                *slot.lock().unwrap() = Some(ctx);
                Ok(())
            }
        })
    }

    #[test]
    fn test_completion_set_once() {
        let completion = Completion::new();
        assert!(!completion.is_completed());
        assert!(completion.complete());
        assert!(!completion.complete());
        assert!(completion.is_completed());
    }

    #[tokio::test]
    async fn test_completion_wait_after_complete() {
        let completion = Completion::new();
        completion.complete();
        completion.wait().await;
    }

    #[tokio::test]
    async fn test_completion_wakes_waiter() {
        let completion = Completion::new();
        let waiter = {
            let completion = completion.clone();
            tokio::spawn(async move { completion.wait().await })
        };
        tokio::task::yield_now().await;
        completion.complete();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_next_reuses_context() {
        let root = Context::root(Means::new().with(Depth(0)));
        let slot = Arc::new(std::sync::Mutex::new(None));

        let responded = root.next(&capture(slot.clone())).await.unwrap();
        assert!(!responded);

        let seen = slot.lock().unwrap().take().unwrap();
        assert!(Arc::ptr_eq(&seen.inner, &root.inner));
    }

    #[tokio::test]
    async fn test_next_with_modification_derives_child() {
        let root = Context::root(Means::new().with(Depth(0)));
        let slot = Arc::new(std::sync::Mutex::new(None));

        root.next_with(&capture(slot.clone()), Modification::new().with(Label("x")))
            .await
            .unwrap();

        let child = slot.lock().unwrap().take().unwrap();
        assert_eq!(child.get::<Label>(), Some(&Label("x")));
        assert_eq!(child.get::<Depth>(), Some(&Depth(0)));
        assert!(root.get::<Label>().is_none());
        assert!(Arc::ptr_eq(&child.parent().unwrap().inner, &root.inner));
    }

    #[tokio::test]
    async fn test_modifier_applied_once_per_chain() {
        let modifier = Counting::new();
        let root = Context::root(Means::new());
        let slot = Arc::new(std::sync::Mutex::new(None));

        root.next_with(&capture(slot.clone()), modifier.clone())
            .await
            .unwrap();
        let first = slot.lock().unwrap().take().unwrap();
        assert_eq!(first.get::<Depth>(), Some(&Depth(1)));
        assert!(first.modified_by(modifier.id()).is_some());
        assert!(root.modified_by(modifier.id()).is_none());

        first
            .next_with(&capture(slot.clone()), modifier.clone())
            .await
            .unwrap();
        let second = slot.lock().unwrap().take().unwrap();
        assert!(Arc::ptr_eq(&first.inner, &second.inner));
        assert_eq!(modifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_modify_next_adjusts_later_modifications() {
        let relabel = Arc::new(Relabel {
            id: ModifierId::mint(),
            label: "relabelled",
        });
        let root = Context::root(Means::new());
        let slot = Arc::new(std::sync::Mutex::new(None));

        root.next_with(&capture(slot.clone()), relabel.clone())
            .await
            .unwrap();
        let modified = slot.lock().unwrap().take().unwrap();

        modified
            .next_with(&capture(slot.clone()), Modification::new().with(Label("raw")))
            .await
            .unwrap();
        let child = slot.lock().unwrap().take().unwrap();
        assert_eq!(child.get::<Label>(), Some(&Label("relabelled")));
    }

    #[tokio::test]
    async fn test_oldest_modifier_adjusts_last() {
        let outer = Arc::new(Relabel {
            id: ModifierId::mint(),
            label: "outer",
        });
        let inner = Arc::new(Relabel {
            id: ModifierId::mint(),
            label: "inner",
        });
        let slot = Arc::new(std::sync::Mutex::new(None));

        let root = Context::root(Means::new());
        root.next_with(&capture(slot.clone()), outer).await.unwrap();
        let ctx = slot.lock().unwrap().take().unwrap();
        ctx.next_with(&capture(slot.clone()), inner).await.unwrap();
        let ctx = slot.lock().unwrap().take().unwrap();
        assert_eq!(ctx.applied_modifiers().len(), 2);

        ctx.next_with(&capture(slot.clone()), Modification::new().with(Label("raw")))
            .await
            .unwrap();
        let child = slot.lock().unwrap().take().unwrap();
        assert_eq!(child.get::<Label>(), Some(&Label("outer")));
    }

    #[tokio::test]
    async fn test_next_reports_completion() {
        let root = Context::root(Means::new());
        let responder = Handler::new(|ctx: Context| async move {
            ctx.complete();
            Ok(())
        });
        assert!(root.next(&responder).await.unwrap());
    }

    #[tokio::test]
    async fn test_next_propagates_errors() {
        let root = Context::root(Means::new());
        let failing = Handler::new(|_ctx| async {
            Err::<(), _>(crate::StatusError::bad_request().into())
        });
        let error = root.next(&failing).await.unwrap_err();
        assert_eq!(error.status_code(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_require_missing_means() {
        let root = Context::root(Means::new());
        let error = root.require::<Label>().unwrap_err();
        assert!(error.to_string().contains("Label"));
    }
}
