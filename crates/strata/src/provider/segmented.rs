//! Provider that exposes one child at a time.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use strata_core::{DebugNode, Error, Result};

use super::{
    AggregateSectionProvider, Child, ProviderId, ProviderRef, SectionProvider,
    SectionProviderUpdateDelegate,
};
use crate::delegate::DelegateSlot;
use crate::index::IndexSet;
use crate::section::SectionRef;

/// An aggregate provider that shows only its current child.
///
/// Any change to which child is visible is reported as an invalidation
/// rather than as a section-level diff. Structural changes inside hidden
/// children are not forwarded, but their begin/end brackets are, so batching
/// upstream stays balanced.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strata::{ArraySection, SegmentedSectionProvider, SectionProvider};
///
/// let tabs = SegmentedSectionProvider::new();
/// tabs.append_section(Arc::new(ArraySection::from_vec(vec!["inbox"])));
/// tabs.append_section(Arc::new(ArraySection::from_vec(vec!["sent", "drafts"])));
///
/// assert_eq!(tabs.current_index(), Some(0));
/// tabs.set_current_index(Some(1));
/// assert_eq!(tabs.number_of_elements(0), 2);
/// ```
pub struct SegmentedSectionProvider {
    id: ProviderId,
    name: String,
    self_ref: Weak<Self>,
    children: RwLock<Vec<Child>>,
    current: RwLock<Option<usize>>,
    delegate: DelegateSlot<dyn SectionProviderUpdateDelegate>,
}

impl SegmentedSectionProvider {
    /// Creates a provider with no children and no current child.
    pub fn new() -> Arc<Self> {
        Self::with_name("")
    }

    /// Creates an empty provider with a debug name.
    pub fn with_name(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|self_ref| Self {
            id: ProviderId::next(),
            name,
            self_ref: self_ref.clone(),
            children: RwLock::new(Vec::new()),
            current: RwLock::new(None),
            delegate: DelegateSlot::new(),
        })
    }

    /// Returns the debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the position of the visible child, if any.
    pub fn current_index(&self) -> Option<usize> {
        *self.current.read()
    }

    /// Returns the visible child, if any.
    pub fn current_child(&self) -> Option<Child> {
        let index = self.current_index()?;
        self.children.read().get(index).cloned()
    }

    /// Returns a snapshot of every child, visible or not.
    pub fn children(&self) -> Vec<Child> {
        self.children.read().clone()
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Selects the visible child.
    ///
    /// # Panics
    ///
    /// Panics if `index` is `Some` and out of bounds.
    pub fn set_current_index(&self, index: Option<usize>) {
        if let Err(err) = self.try_set_current_index(index) {
            panic!("SegmentedSectionProvider::set_current_index: {err}");
        }
    }

    /// Selects the visible child, reporting out-of-bounds positions.
    ///
    /// Always reports an invalidation, even when the selection is unchanged.
    pub fn try_set_current_index(&self, index: Option<usize>) -> Result<()> {
        let len = self.child_count();
        if let Some(index) = index {
            if index >= len {
                tracing::error!(target: "strata::provider", index, len, "segment out of bounds");
                return Err(Error::out_of_bounds(index, len));
            }
        }

        tracing::trace!(
            target: "strata::provider",
            provider = self.id.as_raw(),
            previous = ?self.current_index(),
            current = ?index,
            "select segment"
        );
        self.notify_invalidated(|| *self.current.write() = index);
        Ok(())
    }

    /// Appends a child; the first child becomes visible automatically.
    pub fn append(&self, child: Child) {
        let index = self.child_count();
        self.insert(child, index);
    }

    /// Appends a leaf section.
    pub fn append_section(&self, section: SectionRef) {
        self.append(Child::Section(section));
    }

    /// Appends a nested provider.
    pub fn append_provider(&self, provider: ProviderRef) {
        self.append(Child::Provider(provider));
    }

    /// Inserts a child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > child_count()`.
    pub fn insert(&self, child: Child, index: usize) {
        if let Err(err) = self.try_insert(child, index) {
            panic!("SegmentedSectionProvider::insert: {err}");
        }
    }

    /// Inserts a child at `index`, reporting out-of-bounds positions.
    ///
    /// Inserting before the visible child keeps it visible. Inserting into a
    /// provider with no visible child selects the new child.
    pub fn try_insert(&self, child: Child, index: usize) -> Result<()> {
        let len = self.child_count();
        if index > len {
            tracing::error!(target: "strata::provider", index, len, "insert out of bounds");
            return Err(Error::out_of_bounds(index, len));
        }

        if let Child::Provider(provider) = &child {
            provider.set_update_delegate(Some(self.delegate_handle()));
        }

        let delegate = self.delegate.get();
        if let Some(delegate) = &delegate {
            delegate.will_begin_updating(self);
        }

        self.children.write().insert(index, child);
        let selected = {
            let mut current = self.current.write();
            match *current {
                None => {
                    *current = Some(index);
                    true
                }
                Some(visible) => {
                    if index <= visible {
                        *current = Some(visible + 1);
                    }
                    false
                }
            }
        };

        tracing::trace!(
            target: "strata::provider",
            provider = self.id.as_raw(),
            index,
            selected,
            "insert segment"
        );

        if let Some(delegate) = &delegate {
            if selected {
                delegate.invalidate_all(self);
            }
            delegate.did_end_updating(self);
        }
        Ok(())
    }

    /// Removes `child`, returning `false` if it is not a direct child.
    pub fn remove(&self, child: &Child) -> bool {
        let position = self
            .children
            .read()
            .iter()
            .position(|candidate| candidate.is_same(child));
        match position {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Removes and returns the child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= child_count()`.
    pub fn remove_at(&self, index: usize) -> Child {
        match self.try_remove_at(index) {
            Ok(child) => child,
            Err(err) => panic!("SegmentedSectionProvider::remove_at: {err}"),
        }
    }

    /// Removes the child at `index`, reporting out-of-bounds positions.
    ///
    /// Removing the visible child selects the one before it, or the new
    /// first child, or nothing when no children remain.
    pub fn try_remove_at(&self, index: usize) -> Result<Child> {
        let len = self.child_count();
        if index >= len {
            tracing::error!(target: "strata::provider", index, len, "remove out of bounds");
            return Err(Error::out_of_bounds(index, len));
        }

        let delegate = self.delegate.get();
        if let Some(delegate) = &delegate {
            delegate.will_begin_updating(self);
        }

        let (child, remaining) = {
            let mut children = self.children.write();
            let child = children.remove(index);
            (child, children.len())
        };
        let invalidated = {
            let mut current = self.current.write();
            match *current {
                Some(visible) if visible == index => {
                    *current = if index > 0 {
                        Some(index - 1)
                    } else if remaining > 0 {
                        Some(0)
                    } else {
                        None
                    };
                    true
                }
                Some(visible) if visible > index => {
                    *current = Some(visible - 1);
                    false
                }
                _ => false,
            }
        };

        if let Child::Provider(provider) = &child {
            provider.clear_update_delegate(&self.delegate_handle());
        }

        tracing::trace!(
            target: "strata::provider",
            provider = self.id.as_raw(),
            index,
            invalidated,
            "remove segment"
        );

        if let Some(delegate) = &delegate {
            if invalidated {
                delegate.invalidate_all(self);
            }
            delegate.did_end_updating(self);
        }
        Ok(child)
    }

    /// Returns `true` if changes reported by `provider` are visible upward.
    fn is_visible(&self, provider: ProviderId) -> bool {
        self.current_child()
            .and_then(|child| child.contains_provider(provider))
            .is_some()
    }

    fn notify_invalidated(&self, mutate: impl FnOnce()) {
        let delegate = self.delegate.get();
        if let Some(delegate) = &delegate {
            delegate.will_begin_updating(self);
        }
        mutate();
        if let Some(delegate) = &delegate {
            delegate.invalidate_all(self);
            delegate.did_end_updating(self);
        }
    }

    fn delegate_handle(&self) -> Weak<dyn SectionProviderUpdateDelegate> {
        self.self_ref.clone()
    }
}

impl SectionProvider for SegmentedSectionProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn sections(&self) -> Vec<SectionRef> {
        self.current_child()
            .map(|child| child.sections())
            .unwrap_or_default()
    }

    fn number_of_sections(&self) -> usize {
        self.current_child()
            .map_or(0, |child| child.number_of_sections())
    }

    fn update_delegate(&self) -> Option<Arc<dyn SectionProviderUpdateDelegate>> {
        self.delegate.get()
    }

    fn set_update_delegate(&self, delegate: Option<Weak<dyn SectionProviderUpdateDelegate>>) {
        self.delegate.set(delegate);
    }

    fn clear_update_delegate(&self, owner: &Weak<dyn SectionProviderUpdateDelegate>) {
        self.delegate.clear_if(owner);
    }

    fn as_aggregate(&self) -> Option<&dyn AggregateSectionProvider> {
        Some(self)
    }

    fn debug_node(&self) -> DebugNode {
        let current = self.current_index();
        let label = match current {
            Some(index) => format!("{} [segment {index}]", self.name),
            None => format!("{} [no segment]", self.name),
        };
        let mut node = DebugNode::new("SegmentedSectionProvider", label.trim_start())
            .with_id(self.id.as_raw())
            .with_count(self.number_of_sections());
        node.children = self.children().iter().map(Child::debug_node).collect();
        node
    }
}

impl AggregateSectionProvider for SegmentedSectionProvider {
    fn providers(&self) -> Vec<ProviderRef> {
        self.children
            .read()
            .iter()
            .filter_map(|child| child.as_provider().cloned())
            .collect()
    }

    fn section_offset(&self, provider: ProviderId) -> Option<usize> {
        if provider == self.id {
            return Some(0);
        }
        self.current_child()?.contains_provider(provider)
    }
}

impl SectionProviderUpdateDelegate for SegmentedSectionProvider {
    fn will_begin_updating(&self, provider: &dyn SectionProvider) {
        if let Some(delegate) = self.delegate.get() {
            delegate.will_begin_updating(provider);
        }
    }

    fn did_end_updating(&self, provider: &dyn SectionProvider) {
        if let Some(delegate) = self.delegate.get() {
            delegate.did_end_updating(provider);
        }
    }

    fn invalidate_all(&self, provider: &dyn SectionProvider) {
        if !self.is_visible(provider.id()) {
            return;
        }
        if let Some(delegate) = self.delegate.get() {
            delegate.invalidate_all(provider);
        }
    }

    fn did_insert_sections(
        &self,
        provider: &dyn SectionProvider,
        sections: &[SectionRef],
        indexes: &IndexSet,
    ) {
        if !self.is_visible(provider.id()) {
            return;
        }
        if let Some(delegate) = self.delegate.get() {
            delegate.did_insert_sections(provider, sections, indexes);
        }
    }

    fn did_remove_sections(
        &self,
        provider: &dyn SectionProvider,
        sections: &[SectionRef],
        indexes: &IndexSet,
    ) {
        if !self.is_visible(provider.id()) {
            return;
        }
        if let Some(delegate) = self.delegate.get() {
            delegate.did_remove_sections(provider, sections, indexes);
        }
    }
}
