//! Root-level translation from local to global coordinates.
//!
//! A [`SectionProviderMapping`] sits on top of the root provider of a tree.
//! It becomes the update delegate of the root provider and of every visible
//! leaf section, and re-publishes every notification it receives through
//! [`MappingSignals`] in global coordinates: section indexes relative to the
//! whole flattened tree and [`IndexPath`]s addressing elements in it.
//!
//! # Offset cache
//!
//! Providers report section indexes relative to themselves. The mapping
//! keeps a cache from provider identity to the number of sections preceding
//! that provider's first section. The cache is rebuilt with a depth-first
//! walk whenever a provider reports sections inserted or removed, before
//! the triggering event is translated.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use strata_core::{DebugNode, PerfSpan, Signal, ThreadAffinity, TreeDebug, TreeFormatOptions};

use crate::index::{IndexPath, IndexSet, offset_indexes};
use crate::provider::{ProviderId, ProviderRef, SectionProvider, SectionProviderUpdateDelegate};
use crate::section::{Section, SectionId, SectionRef, SectionUpdateDelegate, SelectionHandler};

/// Signals published by a [`SectionProviderMapping`], in global coordinates.
///
/// Every structural signal is emitted between `will_begin_updating` and
/// `did_end_updating`. Element paths are expressed in the state after the
/// individual change, exactly as they were reported by the leaf section.
pub struct MappingSignals {
    /// A batch of changes is about to be reported.
    pub will_begin_updating: Signal<()>,

    /// The batch opened by `will_begin_updating` is complete.
    pub did_end_updating: Signal<()>,

    /// Part of the tree changed in a way that cannot be described
    /// incrementally; every section must be reloaded.
    pub invalidated: Signal<()>,

    /// Sections were inserted at these global indexes.
    pub sections_inserted: Signal<IndexSet>,

    /// Sections were removed from these global indexes.
    pub sections_removed: Signal<IndexSet>,

    /// Sections at these global indexes must be reloaded in place.
    pub sections_updated: Signal<IndexSet>,

    /// Elements were inserted at these global paths.
    pub elements_inserted: Signal<Vec<IndexPath>>,

    /// Elements were removed from these global paths.
    pub elements_removed: Signal<Vec<IndexPath>>,

    /// Elements at these global paths changed in place.
    pub elements_updated: Signal<Vec<IndexPath>>,

    /// An element moved.
    /// Args: (from, to)
    pub element_moved: Signal<(IndexPath, IndexPath)>,
}

impl Default for MappingSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingSignals {
    /// Creates a new set of mapping signals.
    pub fn new() -> Self {
        Self {
            will_begin_updating: Signal::new(),
            did_end_updating: Signal::new(),
            invalidated: Signal::new(),
            sections_inserted: Signal::new(),
            sections_removed: Signal::new(),
            sections_updated: Signal::new(),
            elements_inserted: Signal::new(),
            elements_removed: Signal::new(),
            elements_updated: Signal::new(),
            element_moved: Signal::new(),
        }
    }
}

/// Translates a provider tree into global coordinates.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strata::{ArraySection, ComposedSectionProvider, IndexPath, SectionProviderMapping};
///
/// let root = ComposedSectionProvider::new();
/// let header = Arc::new(ArraySection::from_vec(vec!["title"]));
/// let body = Arc::new(ArraySection::from_vec(vec!["a", "b"]));
/// root.append_section(header);
/// root.append_section(body.clone());
///
/// let mapping = SectionProviderMapping::new(root);
/// mapping.signals().elements_inserted.connect(|paths| {
///     assert_eq!(paths, &vec![IndexPath::new(1, 2)]);
/// });
///
/// body.append("c");
/// assert_eq!(mapping.number_of_elements(1), 3);
/// ```
pub struct SectionProviderMapping {
    provider: ProviderRef,
    self_ref: Weak<Self>,
    offsets: RwLock<HashMap<ProviderId, usize>>,
    tracked: RwLock<Vec<SectionRef>>,
    signals: MappingSignals,
    affinity: ThreadAffinity,
}

impl SectionProviderMapping {
    /// Creates a mapping over `provider` and attaches it as the delegate of
    /// the provider and of every visible section.
    pub fn new(provider: ProviderRef) -> Arc<Self> {
        let mapping = Arc::new_cyclic(|self_ref| Self {
            provider,
            self_ref: self_ref.clone(),
            offsets: RwLock::new(HashMap::new()),
            tracked: RwLock::new(Vec::new()),
            signals: MappingSignals::new(),
            affinity: ThreadAffinity::current(),
        });
        mapping
            .provider
            .set_update_delegate(Some(mapping.provider_handle()));
        mapping.refresh();
        tracing::debug!(
            target: "strata::mapping",
            provider = mapping.provider.id().as_raw(),
            sections = mapping.number_of_sections(),
            "mapping attached"
        );
        mapping
    }

    /// Returns the root provider.
    pub fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    /// Returns the signals published in global coordinates.
    pub fn signals(&self) -> &MappingSignals {
        &self.signals
    }

    /// Returns the number of visible sections in the whole tree.
    pub fn number_of_sections(&self) -> usize {
        self.provider.number_of_sections()
    }

    /// Returns the number of elements in the section at global index `section`.
    pub fn number_of_elements(&self, section: usize) -> usize {
        self.provider.number_of_elements(section)
    }

    /// Returns the section at global index `section`.
    pub fn section(&self, section: usize) -> Option<SectionRef> {
        self.provider.sections().get(section).cloned()
    }

    /// Returns the cached global offset of `provider`'s first section.
    pub fn section_offset(&self, provider: ProviderId) -> Option<usize> {
        self.offsets.read().get(&provider).copied()
    }

    /// Returns the global index of `section`.
    pub fn section_index(&self, section: SectionId) -> Option<usize> {
        self.provider
            .sections()
            .iter()
            .position(|candidate| candidate.id() == section)
    }

    /// Converts a section index local to `provider` into a global one.
    pub fn global_section(&self, provider: ProviderId, local: usize) -> Option<usize> {
        self.section_offset(provider).map(|offset| offset + local)
    }

    /// Converts an element of `section` into a global index path.
    pub fn global_index_path(&self, section: SectionId, item: usize) -> Option<IndexPath> {
        self.section_index(section)
            .map(|index| IndexPath::new(index, item))
    }

    /// Resolves a global index path into its section and local item.
    pub fn local_index_path(&self, path: IndexPath) -> Option<(SectionRef, usize)> {
        let section = self.section(path.section)?;
        (path.item < section.number_of_elements()).then_some((section, path.item))
    }

    /// Runs `f` with the selection capability of the section at `path` and
    /// the local item index, if the section has that capability.
    pub fn with_selection_handler<R>(
        &self,
        path: IndexPath,
        f: impl FnOnce(&dyn SelectionHandler, usize) -> R,
    ) -> Option<R> {
        let (section, item) = self.local_index_path(path)?;
        let handler = section.selection_handler()?;
        Some(f(handler, item))
    }

    /// Returns whether the element at `path` may be selected.
    pub fn should_select(&self, path: IndexPath) -> bool {
        self.with_selection_handler(path, |handler, item| handler.should_select(item))
            .unwrap_or(false)
    }

    /// Selects the element at `path`, returning `true` if its section
    /// accepted the selection.
    pub fn select(&self, path: IndexPath) -> bool {
        self.with_selection_handler(path, |handler, item| {
            if handler.should_select(item) {
                handler.did_select(item);
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Deselects the element at `path`, returning `true` if its section
    /// handles selection.
    pub fn deselect(&self, path: IndexPath) -> bool {
        self.with_selection_handler(path, |handler, item| handler.did_deselect(item))
            .is_some()
    }

    /// Renders the tree with default options.
    pub fn debug_tree(&self) -> String {
        self.format_tree(TreeFormatOptions::default())
    }

    /// Renders the tree with `options`.
    pub fn format_tree(&self, options: TreeFormatOptions) -> String {
        let root = DebugNode::new("SectionProviderMapping", "")
            .with_count(self.number_of_sections())
            .with_child(self.provider.debug_node());
        TreeDebug::with_options(options).format(&root)
    }

    /// Rebuilds the offset cache and reattaches the visible sections.
    fn refresh(&self) {
        self.rebuild_offsets();
        self.track_sections();
    }

    fn rebuild_offsets(&self) {
        let _span = PerfSpan::new("rebuild_offsets");
        let mut offsets = HashMap::new();
        let mut pending = vec![(self.provider.clone(), 0)];
        while let Some((provider, offset)) = pending.pop() {
            offsets.insert(provider.id(), offset);
            let Some(aggregate) = provider.as_aggregate() else {
                continue;
            };
            for child in aggregate.providers() {
                if let Some(inner) = aggregate.section_offset(child.id()) {
                    pending.push((child, offset + inner));
                }
            }
        }
        tracing::trace!(target: "strata::mapping", providers = offsets.len(), "offset cache rebuilt");
        *self.offsets.write() = offsets;
    }

    fn track_sections(&self) {
        let current = self.provider.sections();
        let previous = std::mem::replace(&mut *self.tracked.write(), current.clone());

        let handle = self.section_handle();
        for section in &previous {
            section.clear_update_delegate(&handle);
        }
        for section in &current {
            section.set_update_delegate(Some(handle.clone()));
        }
    }

    /// Resolves a provider-local index set, asserting the provider is known.
    fn resolve(&self, provider: &dyn SectionProvider, indexes: &IndexSet) -> Option<IndexSet> {
        match self.section_offset(provider.id()) {
            Some(offset) => Some(offset_indexes(indexes, offset)),
            None => {
                tracing::error!(
                    target: "strata::mapping",
                    provider = provider.id().as_raw(),
                    "notification from a provider that is not part of the mapped tree"
                );
                debug_assert!(
                    false,
                    "{}",
                    strata_core::Error::ProviderNotInTree(provider.id().as_raw())
                );
                None
            }
        }
    }

    /// Global index of a reporting section, logging when it is unknown.
    fn section_of(&self, section: &dyn Section) -> Option<usize> {
        let index = self.section_index(section.id());
        if index.is_none() {
            tracing::warn!(
                target: "strata::mapping",
                section = section.id().as_raw(),
                "notification from a section that is not visible"
            );
        }
        index
    }

    fn section_handle(&self) -> Weak<dyn SectionUpdateDelegate> {
        self.self_ref.clone()
    }

    fn provider_handle(&self) -> Weak<dyn SectionProviderUpdateDelegate> {
        self.self_ref.clone()
    }
}

impl Drop for SectionProviderMapping {
    fn drop(&mut self) {
        self.provider.clear_update_delegate(&self.provider_handle());
        let handle = self.section_handle();
        for section in self.tracked.get_mut().iter() {
            section.clear_update_delegate(&handle);
        }
    }
}

impl SectionProviderUpdateDelegate for SectionProviderMapping {
    fn will_begin_updating(&self, _provider: &dyn SectionProvider) {
        self.affinity.debug_assert_same_thread();
        self.signals.will_begin_updating.emit(());
    }

    fn did_end_updating(&self, _provider: &dyn SectionProvider) {
        self.affinity.debug_assert_same_thread();
        self.signals.did_end_updating.emit(());
    }

    fn invalidate_all(&self, provider: &dyn SectionProvider) {
        self.affinity.debug_assert_same_thread();
        self.refresh();
        tracing::trace!(target: "strata::mapping", provider = provider.id().as_raw(), "invalidate");
        self.signals.invalidated.emit(());
    }

    fn did_insert_sections(
        &self,
        provider: &dyn SectionProvider,
        _sections: &[SectionRef],
        indexes: &IndexSet,
    ) {
        self.affinity.debug_assert_same_thread();
        self.refresh();
        let Some(global) = self.resolve(provider, indexes) else {
            return;
        };
        tracing::trace!(target: "strata::mapping", sections = ?global, "sections inserted");
        self.signals.sections_inserted.emit(global);
    }

    fn did_remove_sections(
        &self,
        provider: &dyn SectionProvider,
        _sections: &[SectionRef],
        indexes: &IndexSet,
    ) {
        self.affinity.debug_assert_same_thread();
        self.refresh();
        let Some(global) = self.resolve(provider, indexes) else {
            return;
        };
        tracing::trace!(target: "strata::mapping", sections = ?global, "sections removed");
        self.signals.sections_removed.emit(global);
    }
}

impl SectionUpdateDelegate for SectionProviderMapping {
    fn will_begin_updating(&self, _section: &dyn Section) {
        self.affinity.debug_assert_same_thread();
        self.signals.will_begin_updating.emit(());
    }

    fn did_end_updating(&self, _section: &dyn Section) {
        self.affinity.debug_assert_same_thread();
        self.signals.did_end_updating.emit(());
    }

    fn invalidate_all(&self, section: &dyn Section) {
        self.affinity.debug_assert_same_thread();
        if let Some(index) = self.section_of(section) {
            self.signals.sections_updated.emit(IndexSet::from([index]));
        }
    }

    fn did_insert_element(&self, section: &dyn Section, index: usize) {
        self.affinity.debug_assert_same_thread();
        if let Some(global) = self.section_of(section) {
            self.signals
                .elements_inserted
                .emit(vec![IndexPath::new(global, index)]);
        }
    }

    fn did_remove_element(&self, section: &dyn Section, index: usize) {
        self.affinity.debug_assert_same_thread();
        if let Some(global) = self.section_of(section) {
            self.signals
                .elements_removed
                .emit(vec![IndexPath::new(global, index)]);
        }
    }

    fn did_update_element(&self, section: &dyn Section, index: usize) {
        self.affinity.debug_assert_same_thread();
        if let Some(global) = self.section_of(section) {
            self.signals
                .elements_updated
                .emit(vec![IndexPath::new(global, index)]);
        }
    }

    fn did_move_element(&self, section: &dyn Section, from: usize, to: usize) {
        self.affinity.debug_assert_same_thread();
        if let Some(global) = self.section_of(section) {
            self.signals
                .element_moved
                .emit((IndexPath::new(global, from), IndexPath::new(global, to)));
        }
    }
}

static_assertions::assert_impl_all!(SectionProviderMapping: Send, Sync);

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::provider::{ComposedSectionProvider, SegmentedSectionProvider};
    use crate::section::ArraySection;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Begin,
        End,
        Invalidated,
        SectionsInserted(Vec<usize>),
        SectionsRemoved(Vec<usize>),
        SectionsUpdated(Vec<usize>),
        Inserted(IndexPath),
        Removed(IndexPath),
        Updated(IndexPath),
        Moved(IndexPath, IndexPath),
    }

    fn record(mapping: &SectionProviderMapping) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let signals = mapping.signals();

        let sink = events.clone();
        signals.will_begin_updating.connect(move |_| sink.lock().push(Event::Begin));
        let sink = events.clone();
        signals.did_end_updating.connect(move |_| sink.lock().push(Event::End));
        let sink = events.clone();
        signals.invalidated.connect(move |_| sink.lock().push(Event::Invalidated));
        let sink = events.clone();
        signals.sections_inserted.connect(move |set| {
            sink.lock().push(Event::SectionsInserted(set.iter().copied().collect()))
        });
        let sink = events.clone();
        signals.sections_removed.connect(move |set| {
            sink.lock().push(Event::SectionsRemoved(set.iter().copied().collect()))
        });
        let sink = events.clone();
        signals.sections_updated.connect(move |set| {
            sink.lock().push(Event::SectionsUpdated(set.iter().copied().collect()))
        });
        let sink = events.clone();
        signals.elements_inserted.connect(move |paths| {
            sink.lock().extend(paths.iter().map(|p| Event::Inserted(*p)))
        });
        let sink = events.clone();
        signals.elements_removed.connect(move |paths| {
            sink.lock().extend(paths.iter().map(|p| Event::Removed(*p)))
        });
        let sink = events.clone();
        signals.elements_updated.connect(move |paths| {
            sink.lock().extend(paths.iter().map(|p| Event::Updated(*p)))
        });
        let sink = events.clone();
        signals
            .element_moved
            .connect(move |(from, to)| sink.lock().push(Event::Moved(*from, *to)));

        events
    }

    fn array(count: usize) -> Arc<ArraySection<usize>> {
        Arc::new(ArraySection::from_vec((0..count).collect()))
    }

    #[test]
    fn test_nested_section_inserts_are_globalized() {
        let root = ComposedSectionProvider::new();
        let nested = ComposedSectionProvider::new();
        root.append_section(array(1));
        root.append_provider(nested.clone());
        nested.append_section(array(1));

        let mapping = SectionProviderMapping::new(root.clone());
        let events = record(&mapping);
        assert_eq!(mapping.section_offset(nested.id()), Some(1));

        nested.append_section(array(2));
        root.insert(crate::provider::Child::Section(array(0)), 0);

        use Event::*;
        assert_eq!(
            *events.lock(),
            vec![
                Begin, SectionsInserted(vec![2]), End,
                Begin, SectionsInserted(vec![0]), End,
            ]
        );
        assert_eq!(mapping.section_offset(nested.id()), Some(2));
        assert_eq!(mapping.number_of_sections(), 4);
    }

    #[test]
    fn test_element_changes_are_globalized() {
        let root = ComposedSectionProvider::new();
        let a = array(1);
        let b = array(2);
        root.append_section(a.clone());
        root.append_section(b.clone());

        let mapping = SectionProviderMapping::new(root.clone());
        let events = record(&mapping);

        b.append(3);
        b.remove(0);
        a.replace(0, 5);
        b.move_element(0, 1);
        a.clear();

        use Event::*;
        assert_eq!(
            *events.lock(),
            vec![
                Begin, Inserted(IndexPath::new(1, 2)), End,
                Begin, Removed(IndexPath::new(1, 0)), End,
                Begin, Updated(IndexPath::new(0, 0)), End,
                Begin, Moved(IndexPath::new(1, 0), IndexPath::new(1, 1)), End,
                Begin, SectionsUpdated(vec![0]), End,
            ]
        );
    }

    #[test]
    fn test_sections_are_tracked_across_structure_changes() {
        let root = ComposedSectionProvider::new();
        let mapping = SectionProviderMapping::new(root.clone());

        let late = array(0);
        root.append_section(late.clone());
        assert!(late.update_delegate().is_some());

        root.remove(&crate::provider::Child::Section(late.clone()));
        assert!(late.update_delegate().is_none());

        let events = record(&mapping);
        late.append(1);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_segment_swap_invalidates_and_retracks() {
        let tabs = SegmentedSectionProvider::new();
        let first = array(1);
        let second = array(1);
        tabs.append_section(first.clone());
        tabs.append_section(second.clone());

        let mapping = SectionProviderMapping::new(tabs.clone());
        let events = record(&mapping);
        assert!(second.update_delegate().is_none());

        tabs.set_current_index(Some(1));
        assert!(first.update_delegate().is_none());
        assert!(second.update_delegate().is_some());

        use Event::*;
        assert_eq!(*events.lock(), vec![Begin, Invalidated, End]);
    }

    #[test]
    fn test_queries() {
        let root = ComposedSectionProvider::new();
        let a = array(2);
        let b = array(3);
        root.append_section(a.clone());
        root.append_section(b.clone());
        let mapping = SectionProviderMapping::new(root.clone());

        assert_eq!(mapping.section_index(b.id()), Some(1));
        assert_eq!(mapping.global_index_path(b.id(), 2), Some(IndexPath::new(1, 2)));
        assert_eq!(mapping.global_section(root.id(), 1), Some(1));
        assert!(mapping.section(2).is_none());

        let (section, item) = mapping.local_index_path(IndexPath::new(1, 1)).unwrap();
        assert_eq!((section.id(), item), (b.id(), 1));
        assert!(mapping.local_index_path(IndexPath::new(0, 2)).is_none());

        assert!(!mapping.select(IndexPath::new(0, 0)));
        assert!(mapping.debug_tree().contains("ArraySection"));
    }

    #[test]
    fn test_drop_detaches() {
        let root = ComposedSectionProvider::new();
        let a = array(1);
        root.append_section(a.clone());

        let mapping = SectionProviderMapping::new(root.clone());
        assert!(root.update_delegate().is_some());
        drop(mapping);
        assert!(root.update_delegate().is_none());
        assert!(a.update_delegate().is_none());
    }
}
