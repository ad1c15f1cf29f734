//! Reducer driven by mapping signals.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use strata_core::{ConnectionId, Signal};

use super::changeset::Changeset;
use super::reducer::{ChangesReducer, ReducerOptions};
use crate::mapping::SectionProviderMapping;

/// Connection ids held on a mapping's signals.
struct Connections {
    will_begin_updating: ConnectionId,
    did_end_updating: ConnectionId,
    invalidated: ConnectionId,
    sections_inserted: ConnectionId,
    sections_removed: ConnectionId,
    sections_updated: ConnectionId,
    elements_inserted: ConnectionId,
    elements_removed: ConnectionId,
    elements_updated: ConnectionId,
    element_moved: ConnectionId,
}

/// Records the changes of a mapped tree and publishes one [`Changeset`] per
/// outermost batch.
///
/// A change reported outside of any begin/end bracket is treated as a batch
/// of its own.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use strata::{ArraySection, ChangeRecorder, ComposedSectionProvider, SectionProviderMapping};
///
/// let root = ComposedSectionProvider::new();
/// let section = Arc::new(ArraySection::from_vec(vec![1, 2, 3]));
/// root.append_section(section.clone());
///
/// let mapping = SectionProviderMapping::new(root);
/// let recorder = ChangeRecorder::attach(&mapping);
///
/// let received = Arc::new(Mutex::new(Vec::new()));
/// let sink = received.clone();
/// recorder.changeset_ready().connect(move |changeset| sink.lock().push(changeset.clone()));
///
/// section.remove(0);
/// assert_eq!(received.lock()[0].elements_removed().len(), 1);
/// ```
pub struct ChangeRecorder {
    mapping: Weak<SectionProviderMapping>,
    reducer: Mutex<ChangesReducer>,
    connections: Mutex<Option<Connections>>,
    changeset_ready: Signal<Changeset>,
    invalidated: Signal<()>,
}

impl ChangeRecorder {
    /// Attaches a recorder with default options to `mapping`.
    pub fn attach(mapping: &Arc<SectionProviderMapping>) -> Arc<Self> {
        Self::with_options(mapping, ReducerOptions::default())
    }

    /// Attaches a recorder to `mapping`.
    pub fn with_options(
        mapping: &Arc<SectionProviderMapping>,
        options: ReducerOptions,
    ) -> Arc<Self> {
        let recorder = Arc::new(Self {
            mapping: Arc::downgrade(mapping),
            reducer: Mutex::new(ChangesReducer::with_options(options)),
            connections: Mutex::new(None),
            changeset_ready: Signal::new(),
            invalidated: Signal::new(),
        });

        let signals = mapping.signals();
        let weak = Arc::downgrade(&recorder);

        let this = weak.clone();
        let will_begin_updating = signals.will_begin_updating.connect(move |_| {
            if let Some(recorder) = this.upgrade() {
                recorder.begin();
            }
        });
        let this = weak.clone();
        let did_end_updating = signals.did_end_updating.connect(move |_| {
            if let Some(recorder) = this.upgrade() {
                recorder.end();
            }
        });
        let this = weak.clone();
        let invalidated = signals.invalidated.connect(move |_| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(ChangesReducer::invalidate_all);
            }
        });
        let this = weak.clone();
        let sections_inserted = signals.sections_inserted.connect(move |groups| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(|reducer| reducer.insert_groups(groups));
            }
        });
        let this = weak.clone();
        let sections_removed = signals.sections_removed.connect(move |groups| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(|reducer| reducer.remove_groups(groups));
            }
        });
        let this = weak.clone();
        let sections_updated = signals.sections_updated.connect(move |groups| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(|reducer| reducer.update_groups(groups));
            }
        });
        let this = weak.clone();
        let elements_inserted = signals.elements_inserted.connect(move |paths| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(|reducer| reducer.insert_elements(paths));
            }
        });
        let this = weak.clone();
        let elements_removed = signals.elements_removed.connect(move |paths| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(|reducer| reducer.remove_current_elements(paths));
            }
        });
        let this = weak.clone();
        let elements_updated = signals.elements_updated.connect(move |paths| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(|reducer| reducer.update_elements(paths));
            }
        });
        let this = weak.clone();
        let element_moved = signals.element_moved.connect(move |&(from, to)| {
            if let Some(recorder) = this.upgrade() {
                recorder.record(|reducer| reducer.move_element(from, to));
            }
        });

        *recorder.connections.lock() = Some(Connections {
            will_begin_updating,
            did_end_updating,
            invalidated,
            sections_inserted,
            sections_removed,
            sections_updated,
            elements_inserted,
            elements_removed,
            elements_updated,
            element_moved,
        });
        tracing::debug!(target: "strata::recorder", "recorder attached");
        recorder
    }

    /// Emitted with the reduced changeset at the end of every outermost
    /// batch that could be described incrementally.
    pub fn changeset_ready(&self) -> &Signal<Changeset> {
        &self.changeset_ready
    }

    /// Emitted at the end of every outermost batch that contained an
    /// invalidation.
    pub fn invalidated(&self) -> &Signal<()> {
        &self.invalidated
    }

    /// Returns `true` while a batch is open.
    pub fn is_batching(&self) -> bool {
        self.reducer.lock().is_batching()
    }

    /// Disconnects from the mapping. Returns `false` if already detached.
    pub fn detach(&self) -> bool {
        let Some(connections) = self.connections.lock().take() else {
            return false;
        };
        if let Some(mapping) = self.mapping.upgrade() {
            let signals = mapping.signals();
            signals.will_begin_updating.disconnect(connections.will_begin_updating);
            signals.did_end_updating.disconnect(connections.did_end_updating);
            signals.invalidated.disconnect(connections.invalidated);
            signals.sections_inserted.disconnect(connections.sections_inserted);
            signals.sections_removed.disconnect(connections.sections_removed);
            signals.sections_updated.disconnect(connections.sections_updated);
            signals.elements_inserted.disconnect(connections.elements_inserted);
            signals.elements_removed.disconnect(connections.elements_removed);
            signals.elements_updated.disconnect(connections.elements_updated);
            signals.element_moved.disconnect(connections.element_moved);
        }
        tracing::debug!(target: "strata::recorder", "recorder detached");
        true
    }

    /// Runs `updates` inside one batch, so every change it makes is
    /// published as a single changeset.
    pub fn perform_batch<R>(&self, updates: impl FnOnce() -> R) -> R {
        self.begin();
        let result = updates();
        self.end();
        result
    }

    fn begin(&self) {
        self.reducer.lock().begin_batch();
    }

    fn end(&self) {
        let changeset = self.reducer.lock().end_batch();
        if let Some(changeset) = changeset {
            self.publish(changeset);
        }
    }

    /// Applies `change`, wrapping it in a batch of its own if none is open.
    fn record(&self, change: impl FnOnce(&mut ChangesReducer)) {
        let changeset = {
            let mut reducer = self.reducer.lock();
            if reducer.is_batching() {
                change(&mut reducer);
                None
            } else {
                tracing::trace!(target: "strata::recorder", "change outside batch");
                reducer.begin_batch();
                change(&mut reducer);
                reducer.end_batch()
            }
        };
        if let Some(changeset) = changeset {
            self.publish(changeset);
        }
    }

    fn publish(&self, changeset: Changeset) {
        tracing::debug!(target: "strata::recorder", %changeset, "publish");
        if changeset.requires_reload() {
            self.invalidated.emit(());
        } else {
            self.changeset_ready.emit(changeset);
        }
    }
}

impl Drop for ChangeRecorder {
    fn drop(&mut self) {
        self.detach();
    }
}

static_assertions::assert_impl_all!(ChangeRecorder: Send, Sync);
