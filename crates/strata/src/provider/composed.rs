//! Provider that exposes every child at once.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use strata_core::{DebugNode, Error, Result};

use super::{
    AggregateSectionProvider, Child, ProviderId, ProviderRef, SectionProvider,
    SectionProviderUpdateDelegate, offset_among, sections_before,
};
use crate::delegate::DelegateSlot;
use crate::index::{IndexSet, index_range};
use crate::section::SectionRef;

/// An aggregate provider whose sections are the depth-first concatenation of
/// its children's sections.
///
/// Inserting or removing a child reports the contiguous range of sections
/// that child occupies. Notifications from child providers are forwarded
/// upward unchanged.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strata::{ArraySection, ComposedSectionProvider, SectionProvider, AggregateSectionProvider};
///
/// let inner = ComposedSectionProvider::new();
/// inner.append_section(Arc::new(ArraySection::from_vec(vec![1, 2])));
/// inner.append_section(Arc::new(ArraySection::from_vec(vec![3, 4, 5])));
///
/// let trailing = ComposedSectionProvider::new();
///
/// let root = ComposedSectionProvider::new();
/// root.append_provider(inner.clone());
/// root.append_provider(trailing.clone());
///
/// assert_eq!(root.number_of_sections(), 2);
/// assert_eq!(root.section_offset(trailing.id()), Some(2));
/// ```
pub struct ComposedSectionProvider {
    id: ProviderId,
    name: String,
    self_ref: Weak<Self>,
    children: RwLock<Vec<Child>>,
    delegate: DelegateSlot<dyn SectionProviderUpdateDelegate>,
}

impl ComposedSectionProvider {
    /// Creates an empty provider.
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
            delegate: DelegateSlot::new(),
        })
    }

    /// Returns the debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a snapshot of the children.
    pub fn children(&self) -> Vec<Child> {
        self.children.read().clone()
    }

    /// Returns the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Appends a child.
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
            panic!("ComposedSectionProvider::insert: {err}");
        }
    }

    /// Inserts a child directly after `existing`.
    ///
    /// # Panics
    ///
    /// Panics if `existing` is not a direct child.
    pub fn insert_after(&self, child: Child, existing: &Child) {
        let position = self.position_of(existing);
        match position {
            Some(position) => self.insert(child, position + 1),
            None => panic!("ComposedSectionProvider::insert_after: {}", Error::ChildNotFound),
        }
    }

    /// Inserts a child at `index`, reporting out-of-bounds positions.
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

        let first = {
            let mut children = self.children.write();
            children.insert(index, child.clone());
            sections_before(&children, index)
        };
        let sections = child.sections();
        let indexes = index_range(first..first + sections.len());

        tracing::trace!(
            target: "strata::provider",
            provider = self.id.as_raw(),
            index,
            first_section = first,
            section_count = sections.len(),
            "insert child"
        );

        if let Some(delegate) = &delegate {
            if !indexes.is_empty() {
                delegate.did_insert_sections(self, &sections, &indexes);
            }
            delegate.did_end_updating(self);
        }
        Ok(())
    }

    /// Removes `child`, returning `false` if it is not a direct child.
    pub fn remove(&self, child: &Child) -> bool {
        match self.position_of(child) {
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
            Err(err) => panic!("ComposedSectionProvider::remove_at: {err}"),
        }
    }

    /// Removes the child at `index`, reporting out-of-bounds positions.
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

        let (child, first) = {
            let mut children = self.children.write();
            let first = sections_before(&children, index);
            (children.remove(index), first)
        };
        let sections = child.sections();
        let indexes = index_range(first..first + sections.len());

        if let Child::Provider(provider) = &child {
            provider.clear_update_delegate(&self.delegate_handle());
        }

        tracing::trace!(
            target: "strata::provider",
            provider = self.id.as_raw(),
            index,
            first_section = first,
            section_count = sections.len(),
            "remove child"
        );

        if let Some(delegate) = &delegate {
            if !indexes.is_empty() {
                delegate.did_remove_sections(self, &sections, &indexes);
            }
            delegate.did_end_updating(self);
        }
        Ok(child)
    }

    /// Removes every child, one at a time from the end.
    pub fn remove_all(&self) {
        while self.child_count() > 0 {
            self.remove_at(self.child_count() - 1);
        }
    }

    fn position_of(&self, child: &Child) -> Option<usize> {
        self.children
            .read()
            .iter()
            .position(|candidate| candidate.is_same(child))
    }

    fn delegate_handle(&self) -> Weak<dyn SectionProviderUpdateDelegate> {
        self.self_ref.clone()
    }
}

impl SectionProvider for ComposedSectionProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn sections(&self) -> Vec<SectionRef> {
        self.children.read().iter().flat_map(Child::sections).collect()
    }

    fn number_of_sections(&self) -> usize {
        self.children.read().iter().map(Child::number_of_sections).sum()
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
        let children = self.children();
        let mut node = DebugNode::new("ComposedSectionProvider", self.name.clone())
            .with_id(self.id.as_raw())
            .with_count(self.number_of_sections());
        node.children = children.iter().map(Child::debug_node).collect();
        node
    }
}

impl AggregateSectionProvider for ComposedSectionProvider {
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
        offset_among(&self.children.read(), provider)
    }
}

impl SectionProviderUpdateDelegate for ComposedSectionProvider {
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
        if let Some(delegate) = self.delegate.get() {
            delegate.did_remove_sections(provider, sections, indexes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{ProviderEvent, ProviderObserver};
    use crate::section::ArraySection;

    fn section(count: usize) -> SectionRef {
        Arc::new(ArraySection::from_vec((0..count).collect::<Vec<_>>()))
    }

    #[test]
    fn test_append_reports_section_range() {
        let root = ComposedSectionProvider::new();
        let observer = ProviderObserver::attach(root.as_ref());
        let id = root.id();

        root.append_section(section(2));
        let child = ComposedSectionProvider::new();
        child.append_section(section(1));
        child.append_section(section(0));
        root.append_provider(child);

        use ProviderEvent::*;
        assert_eq!(
            observer.take(),
            vec![
                Begin(id), Inserted(id, vec![0]), End(id),
                Begin(id), Inserted(id, vec![1, 2]), End(id),
            ]
        );
        assert_eq!(root.number_of_sections(), 3);
        assert_eq!(root.number_of_elements(0), 2);
        assert_eq!(root.number_of_elements(2), 0);
    }

    #[test]
    fn test_empty_provider_insert_is_bracket_only() {
        let root = ComposedSectionProvider::new();
        let observer = ProviderObserver::attach(root.as_ref());
        let id = root.id();

        root.append_provider(ComposedSectionProvider::new());
        assert_eq!(observer.take(), vec![ProviderEvent::Begin(id), ProviderEvent::End(id)]);
    }

    #[test]
    fn test_remove_reports_previous_range() {
        let root = ComposedSectionProvider::new();
        let first = section(1);
        let middle = ComposedSectionProvider::new();
        middle.append_section(section(3));
        middle.append_section(section(4));
        root.append_section(first.clone());
        root.append_provider(middle.clone());
        root.append_section(section(5));

        let observer = ProviderObserver::attach(root.as_ref());
        let id = root.id();
        assert!(root.remove(&Child::Provider(middle.clone())));
        assert!(!root.remove(&Child::Provider(middle.clone())));
        root.remove(&Child::Section(first));

        use ProviderEvent::*;
        assert_eq!(
            observer.take(),
            vec![
                Begin(id), Removed(id, vec![1, 2]), End(id),
                Begin(id), Removed(id, vec![0]), End(id),
            ]
        );
        assert_eq!(root.number_of_sections(), 1);
        assert!(middle.update_delegate().is_none());
    }

    #[test]
    fn test_child_notifications_are_forwarded_unchanged() {
        let root = ComposedSectionProvider::new();
        let child = ComposedSectionProvider::new();
        root.append_section(section(1));
        root.append_provider(child.clone());

        let observer = ProviderObserver::attach(root.as_ref());
        child.append_section(section(2));

        let child_id = child.id();
        use ProviderEvent::*;
        assert_eq!(
            observer.take(),
            vec![Begin(child_id), Inserted(child_id, vec![0]), End(child_id)]
        );
    }

    #[test]
    fn test_section_offset() {
        let root = ComposedSectionProvider::new();
        let a = ComposedSectionProvider::new();
        let nested = ComposedSectionProvider::new();
        let b = ComposedSectionProvider::new();
        let stranger = ComposedSectionProvider::new();

        a.append_section(section(2));
        a.append_provider(nested.clone());
        nested.append_section(section(1));
        a.append_section(section(3));
        root.append_section(section(0));
        root.append_provider(a.clone());
        root.append_provider(b.clone());

        assert_eq!(root.section_offset(root.id()), Some(0));
        assert_eq!(root.section_offset(a.id()), Some(1));
        assert_eq!(root.section_offset(nested.id()), Some(2));
        assert_eq!(root.section_offset(b.id()), Some(4));
        assert_eq!(root.section_offset(stranger.id()), None);
        assert_eq!(root.providers().len(), 2);
    }

    #[test]
    fn test_insert_after() {
        let root = ComposedSectionProvider::new();
        let first = Child::Section(section(1));
        let last = Child::Section(section(2));
        root.append(first.clone());
        root.append(last.clone());

        let middle = section(7);
        root.insert_after(Child::Section(middle.clone()), &first);

        let ids: Vec<_> = root.sections().iter().map(|s| s.id()).collect();
        assert_eq!(ids[1], middle.id());
    }

    #[test]
    fn test_try_insert_out_of_bounds() {
        let root = ComposedSectionProvider::new();
        let err = root.try_insert(Child::Section(section(1)), 2).unwrap_err();
        assert_eq!(err, Error::out_of_bounds(2, 0));
        assert!(root.try_remove_at(0).unwrap_err().is_out_of_bounds());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_insert_out_of_bounds_panics() {
        let root = ComposedSectionProvider::new();
        root.insert(Child::Section(section(1)), 1);
    }

    #[test]
    fn test_debug_node() {
        let root = ComposedSectionProvider::with_name("root");
        root.append_section(section(2));
        let node = root.debug_node();
        assert_eq!(node.label, "root");
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].count, Some(2));
    }
}
