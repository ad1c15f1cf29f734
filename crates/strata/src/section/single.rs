//! Section holding at most one element.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use strata_core::DebugNode;

use super::{Section, SectionId, SectionUpdateDelegate, notify_section};
use crate::delegate::DelegateSlot;

/// A section with zero or one element.
///
/// Useful for headers, banners and placeholder rows that come and go.
pub struct SingleElementSection<T> {
    id: SectionId,
    element: RwLock<Option<T>>,
    delegate: DelegateSlot<dyn SectionUpdateDelegate>,
}

impl<T: Send + Sync + 'static> SingleElementSection<T> {
    /// Creates a section holding `element`, if any.
    pub fn new(element: Option<T>) -> Self {
        Self {
            id: SectionId::next(),
            element: RwLock::new(element),
            delegate: DelegateSlot::new(),
        }
    }

    /// Replaces the element, returning the previous one.
    ///
    /// Reports an insertion, removal or update depending on whether the
    /// section gains, loses or keeps its element.
    pub fn replace(&self, element: Option<T>) -> Option<T> {
        let has_new = element.is_some();
        let previous = std::mem::replace(&mut *self.element.write(), element);

        match (previous.is_some(), has_new) {
            (false, true) => {
                notify_section(self, |delegate, section| delegate.did_insert_element(section, 0))
            }
            (true, false) => {
                notify_section(self, |delegate, section| delegate.did_remove_element(section, 0))
            }
            (true, true) => {
                notify_section(self, |delegate, section| delegate.did_update_element(section, 0))
            }
            (false, false) => {}
        }

        previous
    }
}

impl<T: Clone + Send + Sync + 'static> SingleElementSection<T> {
    /// Returns a clone of the element.
    pub fn element(&self) -> Option<T> {
        self.element.read().clone()
    }
}

impl<T: Send + Sync + 'static> Section for SingleElementSection<T> {
    fn id(&self) -> SectionId {
        self.id
    }

    fn number_of_elements(&self) -> usize {
        usize::from(self.element.read().is_some())
    }

    fn update_delegate(&self) -> Option<Arc<dyn SectionUpdateDelegate>> {
        self.delegate.get()
    }

    fn set_update_delegate(&self, delegate: Option<Weak<dyn SectionUpdateDelegate>>) {
        self.delegate.set(delegate);
    }

    fn clear_update_delegate(&self, owner: &Weak<dyn SectionUpdateDelegate>) {
        self.delegate.clear_if(owner);
    }

    fn debug_node(&self) -> DebugNode {
        DebugNode::new("SingleElementSection", "")
            .with_id(self.id.as_raw())
            .with_count(self.number_of_elements())
    }
}
