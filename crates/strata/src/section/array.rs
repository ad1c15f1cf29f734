//! `Vec`-backed section.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use strata_core::DebugNode;

use super::{Section, SectionId, SectionUpdateDelegate, SelectionHandler, notify_section};
use crate::delegate::DelegateSlot;

/// A section backed by a `Vec<T>`.
///
/// Every mutation reports itself to the section's update delegate, bracketed
/// by begin/end notifications. Indexes out of bounds are programmer errors
/// and panic, exactly like the equivalent `Vec` operations.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strata::{ArraySection, Section};
///
/// let fruit = Arc::new(ArraySection::from_vec(vec!["apple", "pear"]).with_name("fruit"));
/// fruit.append("plum");
/// fruit.remove(0);
///
/// assert_eq!(fruit.number_of_elements(), 2);
/// assert_eq!(fruit.element_at(0), Some("pear"));
/// ```
pub struct ArraySection<T> {
    id: SectionId,
    name: String,
    elements: RwLock<Vec<T>>,
    delegate: DelegateSlot<dyn SectionUpdateDelegate>,
    selection: Option<Box<dyn SelectionHandler>>,
}

impl<T: Send + Sync + 'static> Default for ArraySection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> ArraySection<T> {
    /// Creates an empty section.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Creates a section holding `elements`.
    pub fn from_vec(elements: Vec<T>) -> Self {
        Self {
            id: SectionId::next(),
            name: String::new(),
            elements: RwLock::new(elements),
            delegate: DelegateSlot::new(),
            selection: None,
        }
    }

    /// Sets a debug name shown in tree visualizations.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches a selection capability.
    pub fn with_selection_handler(mut self, handler: impl SelectionHandler + 'static) -> Self {
        self.selection = Some(Box::new(handler));
        self
    }

    /// Returns the debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    /// Returns `true` if the section holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }

    /// Runs `f` with read access to the elements.
    pub fn with_elements<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.elements.read())
    }

    /// Appends an element to the end of the section.
    pub fn append(&self, element: T) {
        let index = {
            let mut elements = self.elements.write();
            elements.push(element);
            elements.len() - 1
        };
        tracing::trace!(target: "strata::section", section = self.id.as_raw(), index, "append");
        notify_section(self, |delegate, section| delegate.did_insert_element(section, index));
    }

    /// Inserts an element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, element: T) {
        self.elements.write().insert(index, element);
        tracing::trace!(target: "strata::section", section = self.id.as_raw(), index, "insert");
        notify_section(self, |delegate, section| delegate.did_insert_element(section, index));
    }

    /// Removes and returns the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&self, index: usize) -> T {
        let removed = self.elements.write().remove(index);
        tracing::trace!(target: "strata::section", section = self.id.as_raw(), index, "remove");
        notify_section(self, |delegate, section| delegate.did_remove_element(section, index));
        removed
    }

    /// Replaces the element at `index`, returning the previous one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn replace(&self, index: usize, element: T) -> T {
        let previous = std::mem::replace(&mut self.elements.write()[index], element);
        notify_section(self, |delegate, section| delegate.did_update_element(section, index));
        previous
    }

    /// Moves the element at `from` so that it ends up at `to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn move_element(&self, from: usize, to: usize) {
        {
            let mut elements = self.elements.write();
            let len = elements.len();
            assert!(
                from < len && to < len,
                "move {from} -> {to} out of bounds for section of {len} elements"
            );
            let element = elements.remove(from);
            elements.insert(to, element);
        }
        notify_section(self, |delegate, section| delegate.did_move_element(section, from, to));
    }

    /// Replaces every element; the change is reported as an invalidation.
    pub fn replace_all(&self, elements: Vec<T>) {
        *self.elements.write() = elements;
        tracing::trace!(target: "strata::section", section = self.id.as_raw(), "replace all");
        notify_section(self, |delegate, section| delegate.invalidate_all(section));
    }

    /// Removes every element; the change is reported as an invalidation.
    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }
}

impl<T: Clone + Send + Sync + 'static> ArraySection<T> {
    /// Returns a clone of the element at `index`.
    pub fn element_at(&self, index: usize) -> Option<T> {
        self.elements.read().get(index).cloned()
    }

    /// Returns a clone of every element.
    pub fn to_vec(&self) -> Vec<T> {
        self.elements.read().clone()
    }
}

impl<T: Send + Sync + 'static> Section for ArraySection<T> {
    fn id(&self) -> SectionId {
        self.id
    }

    fn number_of_elements(&self) -> usize {
        self.len()
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
        self.selection.as_deref()
    }

    fn debug_node(&self) -> DebugNode {
        DebugNode::new("ArraySection", self.name.clone())
            .with_id(self.id.as_raw())
            .with_count(self.len())
    }
}
