//! Batch change tracking.
//!
//! A data source reports changes one at a time, each in the coordinates of
//! the tree at that moment. A view that applies changes in batches wants the
//! net effect instead: removals in the coordinates from before the batch,
//! insertions in the coordinates after it, in a fixed order.
//!
//! [`ChangesReducer`] performs that reduction. [`ChangeRecorder`] wires a
//! reducer to a [`SectionProviderMapping`](crate::SectionProviderMapping) so
//! every outermost batch of tree mutations yields one [`Changeset`].
//!
//! # Reduction rules
//!
//! - A removal followed by an insertion in the same gap is a reload.
//! - An insertion followed by a removal of the same entry leaves no trace.
//! - Element changes inside sections inserted or reloaded during the batch
//!   are dropped; the whole section is delivered fresh.
//! - A move is a removal that remembers where the element came from. If the
//!   element survives to the end of the batch untouched, the pair is
//!   reported as one move.

mod changeset;
mod diff;
mod recorder;
mod reducer;

pub use changeset::{BatchOperation, Changeset, ElementMove};
pub use recorder::ChangeRecorder;
pub use reducer::{ChangesReducer, ReducerOptions};
