//! A section that flattens a hierarchy of sections into one.
//!
//! [`FlatSection`] accepts the same children as a provider but presents all
//! of their leaf sections as a single section whose elements are the
//! concatenation of every leaf's elements, in depth-first order.
//!
//! ```text
//! children:   [ A(2) | P{ B(0), C(3) } ]
//! flattened:  A      B      C
//! elements:   0 1           2 3 4
//! ```
//!
//! Changes are translated on the way up: an element change at local index
//! `i` in leaf `C` becomes an element change at `element_offset_of(C) + i`,
//! and a section inserted or removed by a nested provider becomes a run of
//! element insertions or removals.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use strata_core::{DebugNode, Error, Result};

use crate::delegate::DelegateSlot;
use crate::index::IndexSet;
use crate::provider::{
    Child, ProviderRef, SectionProvider, SectionProviderUpdateDelegate, offset_among,
    sections_before,
};
use crate::section::{Section, SectionId, SectionRef, SectionUpdateDelegate, SelectionHandler};

/// A section presenting many leaf sections as one.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strata::{ArraySection, FlatSection, Section};
///
/// let favourites = Arc::new(ArraySection::from_vec(vec!["a", "b"]));
/// let recents = Arc::new(ArraySection::from_vec(vec!["c"]));
///
/// let flat = FlatSection::new();
/// flat.append_section(favourites.clone());
/// flat.append_section(recents.clone());
///
/// assert_eq!(flat.number_of_elements(), 3);
/// assert_eq!(flat.element_offset_of(recents.id()), Some(2));
///
/// let (section, offset) = flat.section_for_element_index(1).unwrap();
/// assert_eq!((section.id(), offset), (favourites.id(), 0));
/// ```
pub struct FlatSection {
    id: SectionId,
    name: String,
    self_ref: Weak<Self>,
    children: RwLock<Vec<Child>>,
    flattened: RwLock<Vec<SectionRef>>,
    delegate: DelegateSlot<dyn SectionUpdateDelegate>,
}

impl FlatSection {
    /// Creates an empty flat section.
    pub fn new() -> Arc<Self> {
        Self::with_name("")
    }

    /// Creates an empty flat section with a debug name.
    pub fn with_name(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|self_ref| Self {
            id: SectionId::next(),
            name,
            self_ref: self_ref.clone(),
            children: RwLock::new(Vec::new()),
            flattened: RwLock::new(Vec::new()),
            delegate: DelegateSlot::new(),
        })
    }

    /// Returns the debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a snapshot of the direct children.
    pub fn children(&self) -> Vec<Child> {
        self.children.read().clone()
    }

    /// Returns the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Returns every leaf section, in element order.
    pub fn sections(&self) -> Vec<SectionRef> {
        self.flattened.read().clone()
    }

    /// Returns the number of elements preceding `section`, or `None` if the
    /// section is not part of this flat section.
    pub fn element_offset_of(&self, section: SectionId) -> Option<usize> {
        let mut offset = 0;
        for candidate in self.flattened.read().iter() {
            if candidate.id() == section {
                return Some(offset);
            }
            offset += candidate.number_of_elements();
        }
        None
    }

    /// Returns the leaf section containing element `index`, together with
    /// that section's element offset.
    ///
    /// Empty sections are skipped. When no section contains `index` but
    /// exactly one empty section starts there, that section is returned.
    pub fn section_for_element_index(&self, index: usize) -> Option<(SectionRef, usize)> {
        let mut offset = 0;
        let mut empty_at_index = Vec::new();
        for section in self.flattened.read().iter() {
            let count = section.number_of_elements();
            if count == 0 {
                if offset == index {
                    empty_at_index.push(section.clone());
                }
                continue;
            }
            if index < offset + count {
                return Some((section.clone(), offset));
            }
            offset += count;
        }

        if empty_at_index.len() == 1 {
            empty_at_index.pop().map(|section| (section, index))
        } else {
            None
        }
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

    /// Appends a provider whose sections are spliced in.
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
            panic!("FlatSection::insert: {err}");
        }
    }

    /// Inserts a child at `index`, reporting out-of-bounds positions.
    pub fn try_insert(&self, child: Child, index: usize) -> Result<()> {
        let len = self.child_count();
        if index > len {
            tracing::error!(target: "strata::flat", index, len, "insert out of bounds");
            return Err(Error::out_of_bounds(index, len));
        }

        if let Child::Provider(provider) = &child {
            provider.set_update_delegate(Some(self.provider_handle()));
        }
        let sections = child.sections();
        for section in &sections {
            section.set_update_delegate(Some(self.section_handle()));
        }

        let delegate = self.delegate.get();
        if let Some(delegate) = &delegate {
            delegate.will_begin_updating(self);
        }

        let (first_element, count) = {
            let mut children = self.children.write();
            let mut flattened = self.flattened.write();
            let position = sections_before(&children, index);
            children.insert(index, child);
            let first_element = elements_before(&flattened, position);
            let count: usize = sections.iter().map(|s| s.number_of_elements()).sum();
            flattened.splice(position..position, sections.iter().cloned());
            (first_element, count)
        };

        tracing::trace!(
            target: "strata::flat",
            section = self.id.as_raw(),
            index,
            first_element,
            count,
            "insert child"
        );

        if let Some(delegate) = &delegate {
            for element in first_element..first_element + count {
                delegate.did_insert_element(self, element);
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
            Err(err) => panic!("FlatSection::remove_at: {err}"),
        }
    }

    /// Removes the child at `index`, reporting out-of-bounds positions.
    pub fn try_remove_at(&self, index: usize) -> Result<Child> {
        let len = self.child_count();
        if index >= len {
            tracing::error!(target: "strata::flat", index, len, "remove out of bounds");
            return Err(Error::out_of_bounds(index, len));
        }

        let delegate = self.delegate.get();
        if let Some(delegate) = &delegate {
            delegate.will_begin_updating(self);
        }

        let (child, removed, first_element, count) = {
            let mut children = self.children.write();
            let mut flattened = self.flattened.write();
            let position = sections_before(&children, index);
            let child = children.remove(index);
            let span = child.number_of_sections().min(flattened.len() - position);
            let first_element = elements_before(&flattened, position);
            let removed: Vec<SectionRef> = flattened.drain(position..position + span).collect();
            let count: usize = removed.iter().map(|s| s.number_of_elements()).sum();
            (child, removed, first_element, count)
        };

        for section in &removed {
            section.clear_update_delegate(&self.section_handle());
        }
        if let Child::Provider(provider) = &child {
            provider.clear_update_delegate(&self.provider_handle());
        }

        tracing::trace!(
            target: "strata::flat",
            section = self.id.as_raw(),
            index,
            first_element,
            count,
            "remove child"
        );

        if let Some(delegate) = &delegate {
            for element in (first_element..first_element + count).rev() {
                delegate.did_remove_element(self, element);
            }
            delegate.did_end_updating(self);
        }
        Ok(child)
    }

    /// Rebuilds the flattened list from the children and reattaches the
    /// leaf delegates.
    fn rebuild(&self) {
        let current: Vec<SectionRef> = self.children.read().iter().flat_map(Child::sections).collect();
        let previous = std::mem::replace(&mut *self.flattened.write(), current.clone());

        let handle = self.section_handle();
        for section in &previous {
            section.clear_update_delegate(&handle);
        }
        for section in &current {
            section.set_update_delegate(Some(handle.clone()));
        }
        tracing::trace!(
            target: "strata::flat",
            section = self.id.as_raw(),
            sections = current.len(),
            "rebuild"
        );
    }

    fn section_handle(&self) -> Weak<dyn SectionUpdateDelegate> {
        self.self_ref.clone()
    }

    fn provider_handle(&self) -> Weak<dyn SectionProviderUpdateDelegate> {
        self.self_ref.clone()
    }

    /// Element offset of `section`, logging when it is not ours.
    fn translate(&self, section: &dyn Section, index: usize) -> Option<usize> {
        let offset = self.element_offset_of(section.id());
        if offset.is_none() {
            tracing::warn!(
                target: "strata::flat",
                section = section.id().as_raw(),
                "notification from a section that is not flattened here"
            );
        }
        offset.map(|offset| offset + index)
    }
}

fn elements_before(sections: &[SectionRef], position: usize) -> usize {
    sections[..position].iter().map(|s| s.number_of_elements()).sum()
}

impl Section for FlatSection {
    fn id(&self) -> SectionId {
        self.id
    }

    fn number_of_elements(&self) -> usize {
        self.flattened.read().iter().map(|s| s.number_of_elements()).sum()
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

    fn selection_handler(&self) -> Option<&dyn SelectionHandler> {
        Some(self)
    }

    fn debug_node(&self) -> DebugNode {
        let mut node = DebugNode::new("FlatSection", self.name.clone())
            .with_id(self.id.as_raw())
            .with_count(self.number_of_elements());
        node.children = self.children().iter().map(Child::debug_node).collect();
        node
    }
}

/// Routes selection to the leaf section owning the element.
impl SelectionHandler for FlatSection {
    fn allows_multiple_selection(&self) -> bool {
        self.sections().iter().any(|section| {
            section
                .selection_handler()
                .is_some_and(|handler| handler.allows_multiple_selection())
        })
    }

    fn should_select(&self, index: usize) -> bool {
        self.section_for_element_index(index)
            .is_some_and(|(section, offset)| {
                section
                    .selection_handler()
                    .is_some_and(|handler| handler.should_select(index - offset))
            })
    }

    fn did_select(&self, index: usize) {
        if let Some((section, offset)) = self.section_for_element_index(index) {
            if let Some(handler) = section.selection_handler() {
                handler.did_select(index - offset);
            }
        }
    }

    fn did_deselect(&self, index: usize) {
        if let Some((section, offset)) = self.section_for_element_index(index) {
            if let Some(handler) = section.selection_handler() {
                handler.did_deselect(index - offset);
            }
        }
    }
}

impl SectionUpdateDelegate for FlatSection {
    fn will_begin_updating(&self, _section: &dyn Section) {
        if let Some(delegate) = self.delegate.get() {
            delegate.will_begin_updating(self);
        }
    }

    fn did_end_updating(&self, _section: &dyn Section) {
        if let Some(delegate) = self.delegate.get() {
            delegate.did_end_updating(self);
        }
    }

    fn invalidate_all(&self, _section: &dyn Section) {
        if let Some(delegate) = self.delegate.get() {
            delegate.invalidate_all(self);
        }
    }

    fn did_insert_element(&self, section: &dyn Section, index: usize) {
        let Some(index) = self.translate(section, index) else {
            return;
        };
        if let Some(delegate) = self.delegate.get() {
            delegate.did_insert_element(self, index);
        }
    }

    fn did_remove_element(&self, section: &dyn Section, index: usize) {
        let Some(index) = self.translate(section, index) else {
            return;
        };
        if let Some(delegate) = self.delegate.get() {
            delegate.did_remove_element(self, index);
        }
    }

    fn did_update_element(&self, section: &dyn Section, index: usize) {
        let Some(index) = self.translate(section, index) else {
            return;
        };
        if let Some(delegate) = self.delegate.get() {
            delegate.did_update_element(self, index);
        }
    }

    fn did_move_element(&self, section: &dyn Section, from: usize, to: usize) {
        let Some(offset) = self.translate(section, 0) else {
            return;
        };
        if let Some(delegate) = self.delegate.get() {
            delegate.did_move_element(self, offset + from, offset + to);
        }
    }
}

impl SectionProviderUpdateDelegate for FlatSection {
    fn will_begin_updating(&self, _provider: &dyn SectionProvider) {
        if let Some(delegate) = self.delegate.get() {
            delegate.will_begin_updating(self);
        }
    }

    fn did_end_updating(&self, _provider: &dyn SectionProvider) {
        if let Some(delegate) = self.delegate.get() {
            delegate.did_end_updating(self);
        }
    }

    fn invalidate_all(&self, _provider: &dyn SectionProvider) {
        self.rebuild();
        if let Some(delegate) = self.delegate.get() {
            delegate.invalidate_all(self);
        }
    }

    fn did_insert_sections(
        &self,
        provider: &dyn SectionProvider,
        sections: &[SectionRef],
        indexes: &IndexSet,
    ) {
        let Some(base) = offset_among(&self.children.read(), provider.id()) else {
            tracing::warn!(
                target: "strata::flat",
                provider = provider.id().as_raw(),
                "sections inserted by a provider that is not flattened here"
            );
            return;
        };

        let delegate = self.delegate.get();
        for (section, local) in sections.iter().zip(indexes) {
            section.set_update_delegate(Some(self.section_handle()));
            let (first_element, count) = {
                let mut flattened = self.flattened.write();
                let position = (base + local).min(flattened.len());
                let first_element = elements_before(&flattened, position);
                flattened.insert(position, section.clone());
                (first_element, section.number_of_elements())
            };

            tracing::trace!(
                target: "strata::flat",
                section = self.id.as_raw(),
                first_element,
                count,
                "splice provider section"
            );

            if let Some(delegate) = &delegate {
                for element in first_element..first_element + count {
                    delegate.did_insert_element(self, element);
                }
            }
        }
    }

    fn did_remove_sections(
        &self,
        _provider: &dyn SectionProvider,
        sections: &[SectionRef],
        _indexes: &IndexSet,
    ) {
        let mut removals: Vec<(usize, usize)> = Vec::with_capacity(sections.len());
        {
            let mut flattened = self.flattened.write();
            let mut positions: Vec<usize> = sections
                .iter()
                .filter_map(|section| flattened.iter().position(|s| s.id() == section.id()))
                .collect();
            positions.sort_unstable_by(|a, b| b.cmp(a));
            for position in positions {
                let first_element = elements_before(&flattened, position);
                let removed = flattened.remove(position);
                removals.push((first_element, removed.number_of_elements()));
            }
        }

        let handle = self.section_handle();
        for section in sections {
            section.clear_update_delegate(&handle);
        }

        let Some(delegate) = self.delegate.get() else {
            return;
        };
        for (first_element, count) in removals {
            tracing::trace!(
                target: "strata::flat",
                section = self.id.as_raw(),
                first_element,
                count,
                "unsplice provider section"
            );
            for element in (first_element..first_element + count).rev() {
                delegate.did_remove_element(self, element);
            }
        }
    }
}
