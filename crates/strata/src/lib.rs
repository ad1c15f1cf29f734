//! Strata - composable, nestable section providers for collection views.
//!
//! Strata lets independent sections, each owning a flat list of elements,
//! be nested inside providers and presented to a collection view as a single
//! flat list of sections with stable global indexes. Every structural change
//! anywhere in the tree is translated to global coordinates and reduced,
//! per batch, to one changeset a batch-updating view can apply as-is.
//!
//! # Building blocks
//!
//! - [`ArraySection`], [`SingleElementSection`]: leaf sections
//! - [`ComposedSectionProvider`]: exposes every child
//! - [`SegmentedSectionProvider`]: exposes one child at a time
//! - [`FlatSection`]: presents a hierarchy as a single section
//! - [`SectionProviderMapping`]: global coordinates and signals for the root
//! - [`ChangesReducer`], [`ChangeRecorder`]: per-batch change reduction
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use strata::{
//!     ArraySection, BatchOperation, ChangeRecorder, ComposedSectionProvider, IndexPath,
//!     SectionProviderMapping,
//! };
//!
//! let pinned = Arc::new(ArraySection::from_vec(vec!["welcome"]));
//! let messages = Arc::new(ArraySection::from_vec(vec!["hi", "hello"]));
//!
//! let feed = ComposedSectionProvider::new();
//! feed.append_section(messages.clone());
//!
//! let root = ComposedSectionProvider::new();
//! root.append_section(pinned);
//! root.append_provider(feed.clone());
//!
//! let mapping = SectionProviderMapping::new(root);
//! let recorder = ChangeRecorder::attach(&mapping);
//!
//! let operations = Arc::new(Mutex::new(Vec::new()));
//! let sink = operations.clone();
//! recorder
//!     .changeset_ready()
//!     .connect(move |changeset| sink.lock().extend(changeset.operations()));
//!
//! messages.append("hey");
//! assert_eq!(
//!     *operations.lock(),
//!     vec![BatchOperation::InsertElements(vec![IndexPath::new(1, 2)])]
//! );
//! ```
//!
//! # Threading
//!
//! Every node is `Send + Sync`, but a tree is meant to be mutated from one
//! thread. Notifications are delivered synchronously and no lock is held
//! while they run, so a handler may mutate the tree again.

mod changes;
mod delegate;
mod flat;
mod index;
mod mapping;
mod provider;
mod section;

pub use changes::{
    BatchOperation, ChangeRecorder, Changeset, ChangesReducer, ElementMove, ReducerOptions,
};
pub use flat::FlatSection;
pub use index::{IndexPath, IndexSet, index_range, offset_indexes};
pub use mapping::{MappingSignals, SectionProviderMapping};
pub use provider::{
    AggregateSectionProvider, Child, ComposedSectionProvider, ProviderId, ProviderRef,
    SectionProvider, SectionProviderUpdateDelegate, SegmentedSectionProvider,
};
pub use section::{
    ArraySection, Section, SectionId, SectionRef, SectionUpdateDelegate, SelectionHandler,
    SingleElementSection,
};

pub use strata_core::{Error, Result};

/// Logging targets, tree visualization and thread checks.
pub mod foundation {
    pub use strata_core::*;
}
