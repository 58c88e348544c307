//! The means bag and the modifications applied to it.
//!
//! [`Means`] is a type-indexed bag: at most one value per type. A context owns
//! its bag and never changes it; deriving a child context merges a
//! [`Modification`] into a copy. Entries are reference-counted, so a merge
//! copies the index, not the values.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single value stored in a bag, with its type name for debugging.
#[derive(Clone)]
struct Entry {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Entry {
    fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: type_name::<T>(),
            value: Arc::new(value),
        }
    }

    fn downcast<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }
}

/// An immutable, type-indexed bag of values available to handlers.
///
/// # Example
///
/// ```
/// use daedalus_core::{Means, Modification};
///
/// #[derive(Debug, PartialEq)]
/// struct Greeting(&'static str);
///
/// let root = Means::new();
/// let child = root.merged(Modification::new().with(Greeting("hello")));
///
/// assert!(root.get::<Greeting>().is_none());
/// assert_eq!(child.get::<Greeting>(), Some(&Greeting("hello")));
/// ```
#[derive(Clone, Default)]
pub struct Means {
    entries: Arc<HashMap<TypeId, Entry>>,
}

impl Means {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a bag with `value` added, replacing any value of the same type.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.entries).insert(TypeId::of::<T>(), Entry::new(value));
        self
    }

    /// Returns the value of type `T`, if present.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(Entry::downcast::<T>)
    }

    /// Returns `true` if a value of type `T` is present.
    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of values in the bag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a new bag holding every entry of `self`, overridden or
    /// extended by the entries of `modification`. `self` is left untouched.
    #[must_use]
    pub fn merged(&self, modification: Modification) -> Self {
        if modification.is_empty() {
            return self.clone();
        }

        let mut entries = HashMap::clone(&self.entries);
        entries.extend(modification.entries);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Returns `true` if every key in `other` is also present in `self`.
    pub fn covers(&self, other: &Self) -> bool {
        other.entries.keys().all(|key| self.entries.contains_key(key))
    }
}

impl fmt::Debug for Means {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}

/// A set of means entries to add or overwrite when deriving a context.
///
/// Applying a modification never removes a key from the bag.
#[derive(Clone, Default)]
pub struct Modification {
    entries: HashMap<TypeId, Entry>,
}

impl Modification {
    /// Creates an empty modification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value`, replacing any earlier value of the same type.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.set(value);
        self
    }

    /// Adds `value` in place.
    pub fn set<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Entry::new(value));
    }

    /// Returns the pending value of type `T`, if any.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(Entry::downcast::<T>)
    }

    /// Drops the pending value of type `T`. Returns `true` if one was present.
    pub fn remove<T: Any>(&mut self) -> bool {
        self.entries.remove(&TypeId::of::<T>()).is_some()
    }

    /// Returns `true` if the modification carries a value of type `T`.
    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        f.debug_tuple("Modification").field(&names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Name(String);

    #[derive(Debug, PartialEq)]
    struct Count(u32);

    #[test]
    fn test_empty_means() {
        let means = Means::new();
        assert!(means.is_empty());
        assert!(means.get::<Name>().is_none());
        assert!(!means.contains::<Name>());
    }

    #[test]
    fn test_with_overrides_same_type() {
        let means = Means::new().with(Count(1)).with(Count(2));
        assert_eq!(means.len(), 1);
        assert_eq!(means.get::<Count>(), Some(&Count(2)));
    }

    #[test]
    fn test_merge_does_not_touch_original() {
        let parent = Means::new().with(Count(1));
        let child = parent.merged(
            Modification::new()
                .with(Count(7))
                .with(Name("child".to_string())),
        );

        assert_eq!(parent.get::<Count>(), Some(&Count(1)));
        assert!(parent.get::<Name>().is_none());
        assert_eq!(child.get::<Count>(), Some(&Count(7)));
        assert_eq!(child.get::<Name>(), Some(&Name("child".to_string())));
        assert!(child.covers(&parent));
    }

    #[test]
    fn test_empty_merge_shares_entries() {
        let parent = Means::new().with(Count(1));
        let child = parent.merged(Modification::new());
        assert!(Arc::ptr_eq(&parent.entries, &child.entries));
    }

    #[test]
    fn test_modification_get_and_remove() {
        let mut modification = Modification::new().with(Count(3));
        assert_eq!(modification.get::<Count>(), Some(&Count(3)));
        assert!(modification.remove::<Count>());
        assert!(!modification.remove::<Count>());
        assert!(modification.is_empty());
    }

    #[test]
    fn test_debug_lists_type_names() {
        let means = Means::new().with(Count(1));
        assert!(format!("{means:?}").contains("Count"));
    }
}
