//! Coordinates for addressing sections and elements.
//!
//! Section indexes are plain `usize` values collected in an [`IndexSet`];
//! elements are addressed by an [`IndexPath`] (section, item) pair. Whether a
//! coordinate is local to a provider, local to a section, or global to the
//! whole tree depends on who produced it, never on its type.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

/// An ordered set of section indexes.
pub type IndexSet = BTreeSet<usize>;

/// Builds an [`IndexSet`] covering a contiguous range.
pub fn index_range(range: Range<usize>) -> IndexSet {
    range.collect()
}

/// Shifts every index in `indexes` by `offset`.
pub fn offset_indexes(indexes: &IndexSet, offset: usize) -> IndexSet {
    indexes.iter().map(|index| index + offset).collect()
}

/// Identifies an element by its section and its item position in that section.
///
/// Ordering is section-major, so a sorted collection of paths walks sections
/// in order and items in order within each section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IndexPath {
    /// The section index.
    pub section: usize,
    /// The item index within the section.
    pub item: usize,
}

impl IndexPath {
    /// Creates a new index path.
    #[inline]
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }

    /// Returns the same item in a different section.
    #[inline]
    pub const fn with_section(self, section: usize) -> Self {
        Self {
            section,
            item: self.item,
        }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.item)
    }
}

impl From<(usize, usize)> for IndexPath {
    fn from((section, item): (usize, usize)) -> Self {
        Self::new(section, item)
    }
}
