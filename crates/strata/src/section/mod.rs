//! Leaf sections: the unit of real content.
//!
//! A section is a flat, ordered list of elements. It owns no children and
//! reports every structural change to a single non-owning update delegate,
//! which is whichever container currently translates its coordinates (a
//! [`FlatSection`](crate::FlatSection) or the root
//! [`SectionProviderMapping`](crate::SectionProviderMapping)).
//!
//! # Implementations
//!
//! - [`ArraySection`]: a `Vec`-backed section with the full mutation API
//! - [`SingleElementSection`]: zero or one element
//!
//! # Capabilities
//!
//! Behaviour beyond element counting is exposed as optional capabilities,
//! queried through accessors such as [`Section::selection_handler`] rather
//! than through downcasting.

mod array;
mod single;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use strata_core::DebugNode;

pub use array::ArraySection;
pub use single::SingleElementSection;

static SECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a section for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(u64);

impl SectionId {
    /// Allocates a fresh, never reused identifier.
    pub fn next() -> Self {
        Self(SECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Shared handle to any section.
pub type SectionRef = Arc<dyn Section>;

/// A flat, ordered container of elements.
pub trait Section: Send + Sync {
    /// Returns this section's identity.
    fn id(&self) -> SectionId;

    /// Returns the number of elements currently in the section.
    fn number_of_elements(&self) -> usize;

    /// Returns `true` if the section has no elements.
    fn is_empty(&self) -> bool {
        self.number_of_elements() == 0
    }

    /// Returns the current update delegate, if it is set and still alive.
    fn update_delegate(&self) -> Option<Arc<dyn SectionUpdateDelegate>>;

    /// Replaces the update delegate.
    fn set_update_delegate(&self, delegate: Option<Weak<dyn SectionUpdateDelegate>>);

    /// Clears the update delegate if it still points at `owner`.
    fn clear_update_delegate(&self, owner: &Weak<dyn SectionUpdateDelegate>);

    /// Selection capability, if this section handles selection.
    fn selection_handler(&self) -> Option<&dyn SelectionHandler> {
        None
    }

    /// Snapshot of this section for tree visualization.
    fn debug_node(&self) -> DebugNode {
        DebugNode::new("Section", "")
            .with_id(self.id().as_raw())
            .with_count(self.number_of_elements())
    }
}

/// Receives change notifications from sections.
///
/// Every sequence of element notifications is bracketed by
/// [`will_begin_updating`](Self::will_begin_updating) and
/// [`did_end_updating`](Self::did_end_updating). Indexes are local to the
/// reporting section and expressed in its state after the change.
pub trait SectionUpdateDelegate: Send + Sync {
    /// A batch of changes is about to be reported.
    fn will_begin_updating(&self, section: &dyn Section);

    /// The batch opened by `will_begin_updating` is complete.
    fn did_end_updating(&self, section: &dyn Section);

    /// The section changed in a way that cannot be described incrementally.
    fn invalidate_all(&self, section: &dyn Section);

    /// An element was inserted at `index`.
    fn did_insert_element(&self, section: &dyn Section, index: usize);

    /// The element at `index` was removed.
    fn did_remove_element(&self, section: &dyn Section, index: usize);

    /// The element at `index` was replaced in place.
    fn did_update_element(&self, section: &dyn Section, index: usize);

    /// The element at `from` now lives at `to`.
    fn did_move_element(&self, section: &dyn Section, from: usize, to: usize);
}

/// Optional selection capability of a section.
///
/// Indexes are local to the section that exposes the capability.
pub trait SelectionHandler: Send + Sync {
    /// Whether more than one element may be selected at once.
    fn allows_multiple_selection(&self) -> bool {
        false
    }

    /// Whether the element at `index` may be selected.
    fn should_select(&self, _index: usize) -> bool {
        true
    }

    /// The element at `index` was selected.
    fn did_select(&self, index: usize);

    /// The element at `index` was deselected.
    fn did_deselect(&self, _index: usize) {}
}

/// Runs `report` between begin/end notifications if a delegate is attached.
pub(crate) fn notify_section<F>(section: &dyn Section, report: F)
where
    F: FnOnce(&dyn SectionUpdateDelegate, &dyn Section),
{
    if let Some(delegate) = section.update_delegate() {
        delegate.will_begin_updating(section);
        report(delegate.as_ref(), section);
        delegate.did_end_updating(section);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Delegate observer shared by section tests.

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum SectionEvent {
        Begin,
        End,
        Invalidate,
        Insert(usize),
        Remove(usize),
        Update(usize),
        Move(usize, usize),
    }

    #[derive(Default)]
    pub(crate) struct SectionObserver {
        pub(crate) events: Mutex<Vec<SectionEvent>>,
    }

    impl SectionObserver {
        pub(crate) fn attach(section: &dyn Section) -> Arc<Self> {
            let observer = Arc::new(Self::default());
            let delegate: Arc<dyn SectionUpdateDelegate> = observer.clone();
            section.set_update_delegate(Some(Arc::downgrade(&delegate)));
            observer
        }

        pub(crate) fn take(&self) -> Vec<SectionEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl SectionUpdateDelegate for SectionObserver {
        fn will_begin_updating(&self, _section: &dyn Section) {
            self.events.lock().push(SectionEvent::Begin);
        }

        fn did_end_updating(&self, _section: &dyn Section) {
            self.events.lock().push(SectionEvent::End);
        }

        fn invalidate_all(&self, _section: &dyn Section) {
            self.events.lock().push(SectionEvent::Invalidate);
        }

        fn did_insert_element(&self, _section: &dyn Section, index: usize) {
            self.events.lock().push(SectionEvent::Insert(index));
        }

        fn did_remove_element(&self, _section: &dyn Section, index: usize) {
            self.events.lock().push(SectionEvent::Remove(index));
        }

        fn did_update_element(&self, _section: &dyn Section, index: usize) {
            self.events.lock().push(SectionEvent::Update(index));
        }

        fn did_move_element(&self, _section: &dyn Section, from: usize, to: usize) {
            self.events.lock().push(SectionEvent::Move(from, to));
        }
    }
}
