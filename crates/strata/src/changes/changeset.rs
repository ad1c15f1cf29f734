//! Finalized, order-sensitive description of one batch.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::index::{IndexPath, IndexSet};

/// An element that moved during a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementMove {
    /// Position before the batch.
    pub from: IndexPath,
    /// Position after the batch.
    pub to: IndexPath,
}

/// One step of applying a [`Changeset`] to a batch-updating view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Discard everything and reload from scratch.
    ReloadData,
    /// Delete elements, given in original coordinates, last first.
    RemoveElements(Vec<IndexPath>),
    /// Reload elements in place.
    UpdateElements(Vec<IndexPath>),
    /// Delete sections, given in original coordinates, last first.
    RemoveGroups(Vec<usize>),
    /// Insert sections at final coordinates.
    InsertGroups(Vec<usize>),
    /// Insert elements at final coordinates.
    InsertElements(Vec<IndexPath>),
    /// Reload sections, given in final coordinates.
    UpdateGroups(Vec<usize>),
    /// Move a single element from its original to its final position.
    MoveElement {
        /// Original position.
        from: IndexPath,
        /// Final position.
        to: IndexPath,
    },
}

/// The net effect of one batch of changes.
///
/// Removals and element updates are expressed in the coordinates from before
/// the batch; insertions and section updates in the coordinates after it.
/// Moves pair the two.
///
/// Element updates in sections that also contain moves are applied after
/// the moves' sections settle, so they are additionally reported in final
/// coordinates; see [`operations`](Self::operations).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    pub(crate) requires_reload: bool,
    pub(crate) groups_removed: IndexSet,
    pub(crate) groups_inserted: IndexSet,
    pub(crate) groups_updated: IndexSet,
    pub(crate) elements_removed: BTreeSet<IndexPath>,
    pub(crate) elements_inserted: BTreeSet<IndexPath>,
    pub(crate) elements_updated: BTreeSet<IndexPath>,
    pub(crate) deferred_updates: BTreeMap<IndexPath, IndexPath>,
    pub(crate) elements_moved: Vec<ElementMove>,
}

impl Changeset {
    /// A changeset that asks the view to reload everything.
    pub fn reload() -> Self {
        Self {
            requires_reload: true,
            ..Self::default()
        }
    }

    /// Returns `true` if the batch could not be described incrementally.
    pub fn requires_reload(&self) -> bool {
        self.requires_reload
    }

    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        !self.requires_reload
            && self.groups_removed.is_empty()
            && self.groups_inserted.is_empty()
            && self.groups_updated.is_empty()
            && self.elements_removed.is_empty()
            && self.elements_inserted.is_empty()
            && self.elements_updated.is_empty()
            && self.elements_moved.is_empty()
    }

    /// Sections removed, in original coordinates.
    pub fn groups_removed(&self) -> &IndexSet {
        &self.groups_removed
    }

    /// Sections inserted, in final coordinates.
    pub fn groups_inserted(&self) -> &IndexSet {
        &self.groups_inserted
    }

    /// Sections reloaded in place, in final coordinates.
    pub fn groups_updated(&self) -> &IndexSet {
        &self.groups_updated
    }

    /// Elements removed, in original coordinates.
    pub fn elements_removed(&self) -> &BTreeSet<IndexPath> {
        &self.elements_removed
    }

    /// Elements inserted, in final coordinates.
    pub fn elements_inserted(&self) -> &BTreeSet<IndexPath> {
        &self.elements_inserted
    }

    /// Elements reloaded in place, in original coordinates.
    pub fn elements_updated(&self) -> &BTreeSet<IndexPath> {
        &self.elements_updated
    }

    /// Elements moved, from original to final coordinates.
    pub fn elements_moved(&self) -> &[ElementMove] {
        &self.elements_moved
    }

    /// Returns the steps to apply, in the order a batch-updating view
    /// requires.
    ///
    /// 1. element removals, last first
    /// 2. element updates (original coordinates)
    /// 3. section removals, last first
    /// 4. section insertions
    /// 5. element insertions
    /// 6. section updates
    /// 7. element updates in moved sections (final coordinates)
    /// 8. element moves
    ///
    /// Empty steps are omitted. A changeset that requires a reload yields a
    /// single [`BatchOperation::ReloadData`].
    pub fn operations(&self) -> Vec<BatchOperation> {
        if self.requires_reload {
            return vec![BatchOperation::ReloadData];
        }

        let mut operations = Vec::new();
        let mut push = |operation: BatchOperation, empty: bool| {
            if !empty {
                operations.push(operation);
            }
        };

        let removed: Vec<_> = self.elements_removed.iter().rev().copied().collect();
        push(BatchOperation::RemoveElements(removed.clone()), removed.is_empty());

        let updated: Vec<_> = self
            .elements_updated
            .iter()
            .filter(|path| !self.deferred_updates.contains_key(*path))
            .copied()
            .collect();
        push(BatchOperation::UpdateElements(updated.clone()), updated.is_empty());

        let groups: Vec<_> = self.groups_removed.iter().rev().copied().collect();
        push(BatchOperation::RemoveGroups(groups.clone()), groups.is_empty());

        let groups: Vec<_> = self.groups_inserted.iter().copied().collect();
        push(BatchOperation::InsertGroups(groups.clone()), groups.is_empty());

        let inserted: Vec<_> = self.elements_inserted.iter().copied().collect();
        push(BatchOperation::InsertElements(inserted.clone()), inserted.is_empty());

        let groups: Vec<_> = self.groups_updated.iter().copied().collect();
        push(BatchOperation::UpdateGroups(groups.clone()), groups.is_empty());

        let deferred: BTreeSet<_> = self.deferred_updates.values().copied().collect();
        push(
            BatchOperation::UpdateElements(deferred.iter().copied().collect()),
            deferred.is_empty(),
        );

        for movement in &self.elements_moved {
            push(
                BatchOperation::MoveElement {
                    from: movement.from,
                    to: movement.to,
                },
                false,
            );
        }

        operations
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requires_reload {
            return write!(f, "Changeset(reload)");
        }
        write!(
            f,
            "Changeset(sections +{} -{} ~{}, elements +{} -{} ~{}, moves {})",
            self.groups_inserted.len(),
            self.groups_removed.len(),
            self.groups_updated.len(),
            self.elements_inserted.len(),
            self.elements_removed.len(),
            self.elements_updated.len(),
            self.elements_moved.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_order() {
        let changeset = Changeset {
            groups_removed: IndexSet::from([1, 3]),
            groups_inserted: IndexSet::from([0]),
            groups_updated: IndexSet::from([2]),
            elements_removed: BTreeSet::from([IndexPath::new(0, 0), IndexPath::new(0, 4)]),
            elements_inserted: BTreeSet::from([IndexPath::new(1, 1)]),
            elements_updated: BTreeSet::from([IndexPath::new(0, 1), IndexPath::new(2, 0)]),
            deferred_updates: BTreeMap::from([(IndexPath::new(2, 0), IndexPath::new(3, 1))]),
            elements_moved: vec![ElementMove {
                from: IndexPath::new(2, 2),
                to: IndexPath::new(3, 0),
            }],
            ..Changeset::default()
        };

        assert_eq!(
            changeset.operations(),
            vec![
                BatchOperation::RemoveElements(vec![IndexPath::new(0, 4), IndexPath::new(0, 0)]),
                BatchOperation::UpdateElements(vec![IndexPath::new(0, 1)]),
                BatchOperation::RemoveGroups(vec![3, 1]),
                BatchOperation::InsertGroups(vec![0]),
                BatchOperation::InsertElements(vec![IndexPath::new(1, 1)]),
                BatchOperation::UpdateGroups(vec![2]),
                BatchOperation::UpdateElements(vec![IndexPath::new(3, 1)]),
                BatchOperation::MoveElement {
                    from: IndexPath::new(2, 2),
                    to: IndexPath::new(3, 0),
                },
            ]
        );
        assert_eq!(
            changeset.to_string(),
            "Changeset(sections +1 -2 ~1, elements +1 -2 ~2, moves 1)"
        );
    }

    #[test]
    fn test_reload_and_empty() {
        assert!(Changeset::default().is_empty());
        assert!(Changeset::default().operations().is_empty());

        let reload = Changeset::reload();
        assert!(!reload.is_empty());
        assert_eq!(reload.operations(), vec![BatchOperation::ReloadData]);
        assert_eq!(reload.to_string(), "Changeset(reload)");
    }
}
