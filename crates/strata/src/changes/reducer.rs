//! Batch change reduction.

use std::collections::{BTreeMap, BTreeSet};

use strata_core::{Error, PerfSpan};

use super::changeset::{Changeset, ElementMove};
use super::diff::{IndexDiff, Inserted, Removed, Slot};
use crate::index::{IndexPath, IndexSet};

/// Tuning for [`ChangesReducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerOptions {
    /// Collapse a removal followed by an insertion at the same place into a
    /// reload.
    pub detect_reloads: bool,
    /// Report moves as moves. When disabled every move is reported as a
    /// removal plus an insertion.
    pub preserve_moves: bool,
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self {
            detect_reloads: true,
            preserve_moves: true,
        }
    }
}

impl ReducerOptions {
    /// Sets whether removal + insertion pairs become reloads.
    pub fn with_detect_reloads(mut self, detect_reloads: bool) -> Self {
        self.detect_reloads = detect_reloads;
        self
    }

    /// Sets whether moves are reported as moves.
    pub fn with_preserve_moves(mut self, preserve_moves: bool) -> Self {
        self.preserve_moves = preserve_moves;
        self
    }
}

/// Accumulates structural changes over a batch and reduces them to one
/// [`Changeset`].
///
/// Insertions, updates and moves take coordinates in the state of the tree
/// at the moment the change happened, exactly as a data source reports them
/// one at a time. [`remove_elements`](Self::remove_elements) takes pre-batch
/// positions; [`remove_current_elements`](Self::remove_current_elements) is
/// its counterpart for removals reported live. Batches nest: only the outermost [`end_batch`](Self::end_batch) yields a
/// changeset.
///
/// # Example
///
/// ```
/// use strata::{ChangesReducer, IndexPath, IndexSet};
///
/// let mut reducer = ChangesReducer::new();
/// reducer.begin_batch();
/// reducer.remove_groups(&IndexSet::from([0]));
/// reducer.insert_groups(&IndexSet::from([0]));
/// let changeset = reducer.end_batch().unwrap();
///
/// assert!(changeset.groups_removed().is_empty());
/// assert_eq!(changeset.groups_updated(), &IndexSet::from([0]));
/// ```
#[derive(Debug, Default)]
pub struct ChangesReducer {
    options: ReducerOptions,
    active_batches: usize,
    invalidated: bool,
    groups: IndexDiff,
    elements: BTreeMap<usize, IndexDiff>,
}

impl ChangesReducer {
    /// Creates an idle reducer with default options.
    pub fn new() -> Self {
        Self::with_options(ReducerOptions::default())
    }

    /// Creates an idle reducer.
    pub fn with_options(options: ReducerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the options in effect.
    pub fn options(&self) -> ReducerOptions {
        self.options
    }

    /// Returns `true` while at least one batch is open.
    pub fn is_batching(&self) -> bool {
        self.active_batches > 0
    }

    /// Returns the batch nesting depth.
    pub fn depth(&self) -> usize {
        self.active_batches
    }

    /// Opens a (possibly nested) batch.
    pub fn begin_batch(&mut self) {
        self.active_batches += 1;
        tracing::debug!(target: "strata::reducer", depth = self.active_batches, "begin batch");
    }

    /// Closes a batch, returning the reduced changeset if it was the
    /// outermost one.
    ///
    /// Ending a batch that was never begun is a programmer error: it panics
    /// in debug builds and returns `None` otherwise.
    #[tracing::instrument(skip_all, target = "strata::reducer", level = "trace")]
    pub fn end_batch(&mut self) -> Option<Changeset> {
        if self.active_batches == 0 {
            tracing::error!(target: "strata::reducer", "{}", Error::UnbalancedBatch);
            debug_assert!(self.active_batches > 0, "{}", Error::UnbalancedBatch);
            return None;
        }

        self.active_batches -= 1;
        tracing::debug!(target: "strata::reducer", depth = self.active_batches, "end batch");
        if self.active_batches > 0 {
            return None;
        }

        let changeset = self.finalize();
        tracing::debug!(
            target: "strata::reducer",
            requires_reload = changeset.requires_reload,
            groups_inserted = changeset.groups_inserted.len(),
            groups_removed = changeset.groups_removed.len(),
            groups_updated = changeset.groups_updated.len(),
            elements_inserted = changeset.elements_inserted.len(),
            elements_removed = changeset.elements_removed.len(),
            elements_updated = changeset.elements_updated.len(),
            elements_moved = changeset.elements_moved.len(),
            "changeset finalized"
        );
        Some(changeset)
    }

    /// Gives up on incremental changes for the current batch.
    ///
    /// Later primitives in the batch are ignored and the changeset requires
    /// a full reload.
    pub fn invalidate_all(&mut self) {
        tracing::debug!(target: "strata::reducer", "invalidate all");
        self.invalidated = true;
    }

    /// Records sections inserted at `groups`, processed in ascending order.
    pub fn insert_groups(&mut self, groups: &IndexSet) {
        if self.invalidated {
            return;
        }
        for &group in groups {
            let outcome = self.groups.insert(group, None, self.options.detect_reloads, &BTreeSet::new());
            if let Inserted::Reloaded(original) = outcome {
                self.elements.remove(&original);
            }
            tracing::trace!(target: "strata::reducer", group, ?outcome, "insert group");
        }
    }

    /// Records sections removed from `groups`, processed in descending order.
    pub fn remove_groups(&mut self, groups: &IndexSet) {
        if self.invalidated {
            return;
        }
        for &group in groups.iter().rev() {
            let outcome = self.groups.remove(group);
            if let Removed::Original { index, .. } = outcome {
                self.elements.remove(&index);
            }
            tracing::trace!(target: "strata::reducer", group, ?outcome, "remove group");
        }
    }

    /// Records sections reloaded in place.
    pub fn update_groups(&mut self, groups: &IndexSet) {
        if self.invalidated {
            return;
        }
        for &group in groups {
            if let Slot::Original(original) = self.groups.update(group) {
                self.elements.remove(&original);
            }
        }
    }

    /// Records elements inserted at `paths`, processed in ascending order.
    pub fn insert_elements(&mut self, paths: &[IndexPath]) {
        if self.invalidated {
            return;
        }
        let mut paths = paths.to_vec();
        paths.sort_unstable();
        for path in paths {
            self.insert_element(path, None, self.options.detect_reloads);
        }
    }

    /// Records elements removed from `paths`, processed in descending order.
    ///
    /// Items are pre-batch positions. A path naming an element inserted in
    /// this batch undoes that insertion; a path naming an element already
    /// removed falls through to the next surviving one, the way repeated
    /// deletes of the same visible row do.
    pub fn remove_elements(&mut self, paths: &[IndexPath]) {
        self.remove_element_paths(paths, true);
    }

    /// Records elements removed from `paths`, given in the coordinates of
    /// the tree at the moment of the removal, as a mapping reports them.
    pub fn remove_current_elements(&mut self, paths: &[IndexPath]) {
        self.remove_element_paths(paths, false);
    }

    fn remove_element_paths(&mut self, paths: &[IndexPath], pre_batch: bool) {
        if self.invalidated {
            return;
        }
        let mut paths = paths.to_vec();
        paths.sort_unstable_by(|a, b| b.cmp(a));
        for path in paths {
            let Some(section) = self.tracked_section(path.section) else {
                continue;
            };
            let diff = self.elements.entry(section).or_default();
            let current = if pre_batch {
                diff.resolve_removal(path.item)
            } else {
                path.item
            };
            let outcome = diff.remove(current);
            tracing::trace!(target: "strata::reducer", %path, current, ?outcome, "remove element");
        }
    }

    /// Records elements reloaded in place.
    pub fn update_elements(&mut self, paths: &[IndexPath]) {
        if self.invalidated {
            return;
        }
        for path in paths {
            let Some(section) = self.tracked_section(path.section) else {
                continue;
            };
            self.elements.entry(section).or_default().update(path.item);
        }
    }

    /// Records elements moved, each from its position before the move to
    /// its position after it.
    pub fn move_elements(&mut self, moves: &[(IndexPath, IndexPath)]) {
        for &(from, to) in moves {
            self.move_element(from, to);
        }
    }

    /// Records one element moved from `from` to `to`.
    pub fn move_element(&mut self, from: IndexPath, to: IndexPath) {
        if self.invalidated || from == to {
            return;
        }

        let origin = match self.tracked_section(from.section) {
            Some(section) => match self.elements.entry(section).or_default().remove(from.item) {
                Removed::WasInserted(origin) => origin,
                Removed::Original {
                    index,
                    was_reloaded: false,
                } => Some(IndexPath::new(section, index)),
                Removed::Original { .. } => None,
            },
            None => None,
        };
        let origin = origin.filter(|_| self.options.preserve_moves);

        tracing::trace!(target: "strata::reducer", %from, %to, ?origin, "move element");
        self.insert_element(to, origin, false);
    }

    fn insert_element(&mut self, path: IndexPath, origin: Option<IndexPath>, pair_reloads: bool) {
        let Some(section) = self.tracked_section(path.section) else {
            return;
        };
        let excluded = self.live_origins(section);
        let outcome = self
            .elements
            .entry(section)
            .or_default()
            .insert(path.item, origin, pair_reloads, &excluded);
        tracing::trace!(target: "strata::reducer", %path, ?outcome, "insert element");
    }

    /// Original index of a current section whose elements are tracked
    /// individually; `None` for sections inserted or reloaded in this batch.
    fn tracked_section(&self, current: usize) -> Option<usize> {
        match self.groups.current_to_original(current) {
            Slot::Original(original) if !self.groups.reloaded.contains(&original) => Some(original),
            _ => None,
        }
    }

    /// Items of `section` that moved elsewhere and are still in flight.
    fn live_origins(&self, section: usize) -> BTreeSet<usize> {
        self.elements
            .values()
            .flat_map(|diff| diff.inserted.values())
            .filter_map(|origin| *origin)
            .filter(|origin| origin.section == section)
            .map(|origin| origin.item)
            .collect()
    }

    fn finalize(&mut self) -> Changeset {
        let _span = PerfSpan::new("finalize");
        let groups = std::mem::take(&mut self.groups);
        let elements = std::mem::take(&mut self.elements);
        let invalidated = std::mem::replace(&mut self.invalidated, false);
        if invalidated {
            return Changeset::reload();
        }

        let mut changeset = Changeset {
            groups_removed: groups.removed.clone(),
            groups_inserted: groups.inserted.keys().copied().collect(),
            groups_updated: groups
                .reloaded
                .iter()
                .map(|&original| groups.original_to_current(original))
                .collect(),
            ..Changeset::default()
        };

        let mut consumed = BTreeSet::new();
        let mut moved_sections = BTreeSet::new();
        for (&section, diff) in &elements {
            let final_section = groups.original_to_current(section);
            for (&item, origin) in &diff.inserted {
                let to = IndexPath::new(final_section, item);
                match *origin {
                    Some(from) if is_pending_origin(&elements, from) => {
                        consumed.insert(from);
                        moved_sections.insert(from.section);
                        moved_sections.insert(section);
                        changeset.elements_moved.push(ElementMove { from, to });
                    }
                    _ => {
                        changeset.elements_inserted.insert(to);
                    }
                }
            }
        }

        for (&section, diff) in &elements {
            let final_section = groups.original_to_current(section);
            for &item in &diff.removed {
                let path = IndexPath::new(section, item);
                if !consumed.contains(&path) {
                    changeset.elements_removed.insert(path);
                }
            }
            for &item in &diff.reloaded {
                let path = IndexPath::new(section, item);
                changeset.elements_updated.insert(path);
                if moved_sections.contains(&section) {
                    let to = IndexPath::new(final_section, diff.original_to_current(item));
                    changeset.deferred_updates.insert(path, to);
                }
            }
        }

        changeset
    }
}

/// Returns `true` if the original element at `origin` is still removed, so a
/// move from it can be reported.
fn is_pending_origin(elements: &BTreeMap<usize, IndexDiff>, origin: IndexPath) -> bool {
    elements
        .get(&origin.section)
        .is_some_and(|diff| diff.removed.contains(&origin.item))
}
