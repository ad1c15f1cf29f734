//! Single-axis bookkeeping between original and current positions.

use std::collections::{BTreeMap, BTreeSet};

use crate::index::IndexPath;

/// Tracks how one ordered axis (the sections of a tree, or the elements of
/// one section) changed since the start of a batch.
///
/// The current sequence is the surviving originals, in order, with the
/// inserted entries interleaved at their current positions. `removed` and
/// `reloaded` hold original positions; `inserted` is keyed by current
/// position and carries the original path of the element it was moved from,
/// if any.
#[derive(Debug, Clone, Default)]
pub(crate) struct IndexDiff {
    pub(crate) removed: BTreeSet<usize>,
    pub(crate) inserted: BTreeMap<usize, Option<IndexPath>>,
    pub(crate) reloaded: BTreeSet<usize>,
}

/// What a current position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// An entry inserted during the batch.
    Inserted,
    /// An original entry that is still present.
    Original(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inserted {
    /// Recorded as a new entry.
    Fresh,
    /// Paired with a removed original in the same gap; it is now a reload.
    Reloaded(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removed {
    /// The entry was inserted during the batch; the insertion is undone.
    WasInserted(Option<IndexPath>),
    /// An original entry is now removed.
    Original { index: usize, was_reloaded: bool },
}

impl IndexDiff {
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty() && self.reloaded.is_empty()
    }

    /// Original position of the `rank`-th surviving original.
    fn nth_surviving(&self, rank: usize) -> usize {
        let mut original = rank;
        for &removed in &self.removed {
            if removed <= original {
                original += 1;
            } else {
                break;
            }
        }
        original
    }

    fn inserted_before(&self, current: usize) -> usize {
        self.inserted.range(..current).count()
    }

    pub(crate) fn current_to_original(&self, current: usize) -> Slot {
        if self.inserted.contains_key(&current) {
            Slot::Inserted
        } else {
            Slot::Original(self.nth_surviving(current - self.inserted_before(current)))
        }
    }

    /// Current position of a surviving original.
    pub(crate) fn original_to_current(&self, original: usize) -> usize {
        let rank = original - self.removed.range(..original).count();
        let mut current = rank;
        for &inserted in self.inserted.keys() {
            if inserted <= current {
                current += 1;
            } else {
                break;
            }
        }
        current
    }

    /// Current position of the entry a removal given in pre-batch
    /// coordinates refers to.
    ///
    /// An entry inserted at `item` is taken as is. Otherwise `item` names an
    /// original; once that original is gone, the removal falls through to
    /// the next original still present.
    pub(crate) fn resolve_removal(&self, item: usize) -> usize {
        if self.inserted.contains_key(&item) {
            return item;
        }
        let mut original = item;
        while self.removed.contains(&original) {
            original += 1;
        }
        self.original_to_current(original)
    }

    /// Records an insertion at `current`.
    ///
    /// With `pair_reloads`, an insertion landing where an original was removed
    /// revives that original as a reload instead. Originals in `excluded` are
    /// never revived.
    pub(crate) fn insert(
        &mut self,
        current: usize,
        origin: Option<IndexPath>,
        pair_reloads: bool,
        excluded: &BTreeSet<usize>,
    ) -> Inserted {
        let rank = current - self.inserted_before(current);
        let revived = if pair_reloads && origin.is_none() {
            let low = match rank {
                0 => 0,
                rank => self.nth_surviving(rank - 1) + 1,
            };
            let high = self.nth_surviving(rank);
            self.removed
                .range(low..high)
                .find(|index| !excluded.contains(index))
                .copied()
        } else {
            None
        };

        self.shift_inserted(current, true);
        match revived {
            Some(original) => {
                self.removed.remove(&original);
                self.reloaded.insert(original);
                Inserted::Reloaded(original)
            }
            None => {
                self.inserted.insert(current, origin);
                Inserted::Fresh
            }
        }
    }

    /// Records a removal at `current`.
    pub(crate) fn remove(&mut self, current: usize) -> Removed {
        let outcome = match self.inserted.remove(&current) {
            Some(origin) => Removed::WasInserted(origin),
            None => {
                let index = self.nth_surviving(current - self.inserted_before(current));
                self.removed.insert(index);
                Removed::Original {
                    index,
                    was_reloaded: self.reloaded.remove(&index),
                }
            }
        };
        self.shift_inserted(current + 1, false);
        outcome
    }

    /// Records an in-place update at `current`.
    ///
    /// Updating an inserted entry is absorbed by the insertion, but it forgets
    /// any move origin: the element is delivered as new content.
    pub(crate) fn update(&mut self, current: usize) -> Slot {
        if let Some(origin) = self.inserted.get_mut(&current) {
            *origin = None;
            return Slot::Inserted;
        }
        let original = self.nth_surviving(current - self.inserted_before(current));
        self.reloaded.insert(original);
        Slot::Original(original)
    }

    /// Shifts inserted keys at or after `from` by one, up or down.
    fn shift_inserted(&mut self, from: usize, up: bool) {
        let tail = self.inserted.split_off(&from);
        self.inserted.extend(
            tail.into_iter()
                .map(|(key, origin)| (if up { key + 1 } else { key - 1 }, origin)),
        );
    }
}
