//! Non-owning upward references.
//!
//! Every node reports its changes to exactly one parent-side delegate. The
//! node never keeps that delegate alive: the slot holds a `Weak`, and a
//! dropped parent simply stops receiving notifications.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Holds a weak reference to a node's update delegate.
pub(crate) struct DelegateSlot<D: ?Sized> {
    inner: RwLock<Option<Weak<D>>>,
}

impl<D: ?Sized> Default for DelegateSlot<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ?Sized> DelegateSlot<D> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Upgrades the delegate, if one is set and still alive.
    pub(crate) fn get(&self) -> Option<Arc<D>> {
        self.inner.read().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set(&self, delegate: Option<Weak<D>>) {
        *self.inner.write() = delegate;
    }

    /// Clears the slot only if it still points at `owner`.
    ///
    /// A section moved from one container to another gets its delegate
    /// replaced by the new container; the old container must not clobber it.
    pub(crate) fn clear_if(&self, owner: &Weak<D>) {
        let mut inner = self.inner.write();
        if inner.as_ref().is_some_and(|current| Weak::ptr_eq(current, owner)) {
            *inner = None;
        }
    }

    /// Returns `true` if the slot points at `owner`.
    #[cfg(test)]
    pub(crate) fn is(&self, owner: &Weak<D>) -> bool {
        self.inner
            .read()
            .as_ref()
            .is_some_and(|current| Weak::ptr_eq(current, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Parent(&'static str);

    impl Named for Parent {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_slot_does_not_keep_delegate_alive() {
        let slot: DelegateSlot<dyn Named> = DelegateSlot::new();
        let parent: Arc<dyn Named> = Arc::new(Parent("a"));
        slot.set(Some(Arc::downgrade(&parent)));

        assert_eq!(slot.get().map(|d| d.name().to_string()), Some("a".into()));
        drop(parent);
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_clear_if_only_clears_owner() {
        let slot: DelegateSlot<dyn Named> = DelegateSlot::new();
        let first: Arc<dyn Named> = Arc::new(Parent("first"));
        let second: Arc<dyn Named> = Arc::new(Parent("second"));
        let first_weak = Arc::downgrade(&first);
        let second_weak = Arc::downgrade(&second);

        slot.set(Some(second_weak.clone()));
        slot.clear_if(&first_weak);
        assert!(slot.is(&second_weak));

        slot.clear_if(&second_weak);
        assert!(slot.get().is_none());
    }
}
