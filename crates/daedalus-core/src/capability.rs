//! Capabilities: reusable handler transformers.
//!
//! A capability wraps a target handler so that it runs in a context extended
//! by the capability's modifier. Composition with [`Capability::and`] is
//! associative, and composing a capability with itself is the same as using it
//! once, because the second application finds its own id in the chain.

use crate::handler::Handler;
use crate::modifier::Modifier;
use std::sync::Arc;

/// A reusable transformer from handler to handler.
pub trait Capability: Send + Sync + 'static {
    /// Returns a handler running `handler` in a context extended by this
    /// capability.
    fn for_handler(&self, handler: Handler) -> Handler;

    /// Chains another capability after this one. The target handler sees the
    /// means of both, and `next` sees the means of `self`.
    fn and<C: Capability>(self, next: C) -> And<Self, C>
    where
        Self: Sized,
    {
        And { first: self, next }
    }
}

/// Two capabilities applied in order. See [`Capability::and`].
#[derive(Debug, Clone)]
pub struct And<A, B> {
    first: A,
    next: B,
}

impl<A: Capability, B: Capability> Capability for And<A, B> {
    fn for_handler(&self, handler: Handler) -> Handler {
        self.first.for_handler(self.next.for_handler(handler))
    }
}

impl<C: Capability + ?Sized> Capability for Arc<C> {
    fn for_handler(&self, handler: Handler) -> Handler {
        (**self).for_handler(handler)
    }
}

impl<C: Capability + ?Sized> Capability for Box<C> {
    fn for_handler(&self, handler: Handler) -> Handler {
        (**self).for_handler(handler)
    }
}

/// Returns a handler that applies `modifier` and then runs `handler`.
///
/// This is the usual body of [`Capability::for_handler`] for capabilities
/// backed by a single modifier.
pub fn with_modifier(modifier: Arc<dyn Modifier>, handler: Handler) -> Handler {
    Handler::new(move |ctx| {
        let modifier = Arc::clone(&modifier);
        let handler = handler.clone();
        async move {
            ctx.next_with(&handler, modifier).await?;
            Ok(())
        }
    })
}
