//! Ordered, identity-deduplicated registration lists.
//!
//! Processors, observers and plugins are registered as `Arc<dyn Trait>`.
//! Adding an instance that is already present is a no-op; order of first
//! insertion is preserved.

use std::fmt;
use std::sync::Arc;

/// An insertion-ordered list holding each instance at most once.
pub struct InstanceList<T: ?Sized> {
    items: Vec<Arc<T>>,
}

impl<T: ?Sized> InstanceList<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append `item` unless the same instance is already registered.
    /// Returns true when the list changed.
    pub fn add(&mut self, item: Arc<T>) -> bool {
        if self.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.items.iter().any(|existing| same_instance(existing, item))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// Compare data pointers only; vtable pointers for the same type may differ
// between codegen units.
fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl<T: ?Sized> Default for InstanceList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for InstanceList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for InstanceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceList")
            .field("len", &self.items.len())
            .finish()
    }
}

impl<'a, T: ?Sized> IntoIterator for &'a InstanceList<T> {
    type Item = &'a Arc<T>;
    type IntoIter = std::slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Tag(&'static str);

    impl Named for Tag {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn same_instance_registered_once_at_first_position() {
        let a: Arc<dyn Named> = Arc::new(Tag("a"));
        let b: Arc<dyn Named> = Arc::new(Tag("b"));

        let mut list = InstanceList::new();
        assert!(list.add(a.clone()));
        assert!(list.add(b.clone()));
        assert!(!list.add(a.clone()));

        let names: Vec<_> = list.iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn equal_but_distinct_instances_are_both_kept() {
        let mut list: InstanceList<dyn Named> = InstanceList::new();
        assert!(list.add(Arc::new(Tag("x"))));
        assert!(list.add(Arc::new(Tag("x"))));
        assert_eq!(list.len(), 2);
    }
}
