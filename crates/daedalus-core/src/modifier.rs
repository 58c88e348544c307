//! Modifiers: identified producers of modifications.

use crate::context::Context;
use crate::error::HandlerResult;
use crate::handler::BoxFuture;
use crate::means::Modification;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of a modifier instance.
///
/// Minted once per modifier and copied with it. Two contexts were modified by
/// "the same" modifier exactly when their recorded ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModifierId(u64);

impl ModifierId {
    /// Mints a fresh, process-unique id.
    #[must_use]
    pub fn mint() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "modifier#{}", self.0)
    }
}

/// A producer of [`Modification`]s with a stable identity.
///
/// Applying a modifier whose id is already recorded in a context chain is a
/// no-op: the handler runs with the current context.
///
/// # Example
///
/// ```
/// use daedalus_core::{BoxFuture, Context, HandlerResult, Modification, Modifier, ModifierId};
///
/// struct Tagging {
///     id: ModifierId,
/// }
///
/// struct Tag(&'static str);
///
/// impl Modifier for Tagging {
///     fn id(&self) -> ModifierId {
///         self.id
///     }
///
///     fn modification<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, HandlerResult<Modification>> {
///         Box::pin(async { Ok(Modification::new().with(Tag("tagged"))) })
///     }
/// }
/// ```
pub trait Modifier: Send + Sync + 'static {
    /// Returns this modifier's identity.
    fn id(&self) -> ModifierId;

    /// Computes the modification to apply on top of `ctx`.
    fn modification<'a>(&'a self, ctx: &'a Context)
        -> BoxFuture<'a, HandlerResult<Modification>>;

    /// Adjusts a modification about to be applied further down the chain.
    ///
    /// Called for every modification applied after this modifier, including
    /// those of other modifiers. `ctx` is the context being extended.
    fn modify_next(&self, ctx: &Context, next: Modification) -> Modification {
        let _ = ctx;
        next
    }
}

/// What [`Context::next_with`] extends the current context with.
#[derive(Clone)]
pub enum Extension {
    /// Plain entries; never checked for repeated application.
    Modification(Modification),
    /// A modifier; skipped if already applied in this chain.
    Modifier(Arc<dyn Modifier>),
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modification(modification) => modification.fmt(f),
            Self::Modifier(modifier) => write!(f, "Modifier({})", modifier.id()),
        }
    }
}

impl From<Modification> for Extension {
    fn from(modification: Modification) -> Self {
        Self::Modification(modification)
    }
}

impl From<Arc<dyn Modifier>> for Extension {
    fn from(modifier: Arc<dyn Modifier>) -> Self {
        Self::Modifier(modifier)
    }
}

impl<M: Modifier> From<Arc<M>> for Extension {
    fn from(modifier: Arc<M>) -> Self {
        Self::Modifier(modifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_ids_are_unique() {
        let a = ModifierId::mint();
        let b = ModifierId::mint();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_id_display() {
        let id = ModifierId::mint();
        assert_eq!(id.to_string(), format!("modifier#{}", id.as_u64()));
    }

    #[test]
    fn test_extension_from_modification() {
        let extension: Extension = Modification::new().into();
        assert!(matches!(extension, Extension::Modification(_)));
    }
}
