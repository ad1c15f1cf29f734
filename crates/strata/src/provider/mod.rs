//! Section providers: containers of sections and nested providers.
//!
//! A provider exposes an ordered list of leaf sections. Aggregate providers
//! build that list from an ordered list of [`Child`]ren, each either a
//! section or another provider, flattened depth-first.
//!
//! # Implementations
//!
//! - [`ComposedSectionProvider`]: exposes every child at once
//! - [`SegmentedSectionProvider`]: exposes exactly one child at a time
//!
//! # Notifications
//!
//! Providers report structural changes upward through
//! [`SectionProviderUpdateDelegate`]. Section indexes in those notifications
//! are local to the provider passed as the first argument, which is the
//! provider that changed, not necessarily the direct child of the receiver:
//! aggregates forward their children's notifications untouched and leave
//! offset translation to the root mapping.

mod composed;
mod segmented;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use strata_core::DebugNode;

use crate::index::IndexSet;
use crate::section::SectionRef;

pub use composed::ComposedSectionProvider;
pub use segmented::SegmentedSectionProvider;

static PROVIDER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a provider for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

impl ProviderId {
    /// Allocates a fresh, never reused identifier.
    pub fn next() -> Self {
        Self(PROVIDER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Shared handle to any provider.
pub type ProviderRef = Arc<dyn SectionProvider>;

/// A source of sections.
pub trait SectionProvider: Send + Sync {
    /// Returns this provider's identity.
    fn id(&self) -> ProviderId;

    /// Returns the visible leaf sections, in order.
    fn sections(&self) -> Vec<SectionRef>;

    /// Returns the number of visible leaf sections.
    fn number_of_sections(&self) -> usize {
        self.sections().len()
    }

    /// Returns the number of elements in the visible section at `section`.
    fn number_of_elements(&self, section: usize) -> usize {
        self.sections()
            .get(section)
            .map_or(0, |section| section.number_of_elements())
    }

    /// Returns the current update delegate, if it is set and still alive.
    fn update_delegate(&self) -> Option<Arc<dyn SectionProviderUpdateDelegate>>;

    /// Replaces the update delegate.
    fn set_update_delegate(&self, delegate: Option<Weak<dyn SectionProviderUpdateDelegate>>);

    /// Clears the update delegate if it still points at `owner`.
    fn clear_update_delegate(&self, owner: &Weak<dyn SectionProviderUpdateDelegate>);

    /// Aggregate capability, if this provider has child providers.
    fn as_aggregate(&self) -> Option<&dyn AggregateSectionProvider> {
        None
    }

    /// Snapshot of this provider for tree visualization.
    fn debug_node(&self) -> DebugNode {
        DebugNode::new("SectionProvider", "")
            .with_id(self.id().as_raw())
            .with_count(self.number_of_sections())
    }
}

/// A provider built from child providers.
pub trait AggregateSectionProvider: SectionProvider {
    /// Returns the direct child providers, in order.
    fn providers(&self) -> Vec<ProviderRef>;

    /// Returns the number of visible sections preceding `provider`'s first
    /// section, searching descendants at any depth.
    ///
    /// Returns `Some(0)` for the receiver itself and `None` when `provider`
    /// is not a visible descendant.
    fn section_offset(&self, provider: ProviderId) -> Option<usize>;
}

/// Receives change notifications from providers.
///
/// Every notification is bracketed by
/// [`will_begin_updating`](Self::will_begin_updating) and
/// [`did_end_updating`](Self::did_end_updating).
pub trait SectionProviderUpdateDelegate: Send + Sync {
    /// A batch of changes is about to be reported.
    fn will_begin_updating(&self, provider: &dyn SectionProvider);

    /// The batch opened by `will_begin_updating` is complete.
    fn did_end_updating(&self, provider: &dyn SectionProvider);

    /// The provider changed in a way that cannot be described incrementally.
    fn invalidate_all(&self, provider: &dyn SectionProvider);

    /// `sections` now occupy `indexes`, local to `provider`.
    fn did_insert_sections(
        &self,
        provider: &dyn SectionProvider,
        sections: &[SectionRef],
        indexes: &IndexSet,
    );

    /// `sections` previously occupied `indexes`, local to `provider`.
    fn did_remove_sections(
        &self,
        provider: &dyn SectionProvider,
        sections: &[SectionRef],
        indexes: &IndexSet,
    );
}

/// A child of an aggregate: a leaf section or a nested provider.
#[derive(Clone)]
pub enum Child {
    /// A leaf section, contributing exactly one section.
    Section(SectionRef),
    /// A nested provider, contributing its visible sections.
    Provider(ProviderRef),
}

impl std::fmt::Debug for Child {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Section(_) => f.debug_tuple("Section").finish_non_exhaustive(),
            Self::Provider(_) => f.debug_tuple("Provider").finish_non_exhaustive(),
        }
    }
}

impl Child {
    /// Number of leaf sections this child contributes.
    pub fn number_of_sections(&self) -> usize {
        match self {
            Self::Section(_) => 1,
            Self::Provider(provider) => provider.number_of_sections(),
        }
    }

    /// Leaf sections this child contributes, in order.
    pub fn sections(&self) -> Vec<SectionRef> {
        match self {
            Self::Section(section) => vec![section.clone()],
            Self::Provider(provider) => provider.sections(),
        }
    }

    /// Returns the nested provider, if this child is one.
    pub fn as_provider(&self) -> Option<&ProviderRef> {
        match self {
            Self::Provider(provider) => Some(provider),
            Self::Section(_) => None,
        }
    }

    /// Returns `true` if both children refer to the same node.
    pub fn is_same(&self, other: &Child) -> bool {
        match (self, other) {
            (Self::Section(a), Self::Section(b)) => a.id() == b.id(),
            (Self::Provider(a), Self::Provider(b)) => a.id() == b.id(),
            _ => false,
        }
    }

    /// Returns `true` if this child is or contains `provider`.
    pub(crate) fn contains_provider(&self, provider: ProviderId) -> Option<usize> {
        let child = self.as_provider()?;
        if child.id() == provider {
            return Some(0);
        }
        child.as_aggregate()?.section_offset(provider)
    }

    /// Snapshot of this child for tree visualization.
    pub fn debug_node(&self) -> DebugNode {
        match self {
            Self::Section(section) => section.debug_node(),
            Self::Provider(provider) => provider.debug_node(),
        }
    }
}

impl From<SectionRef> for Child {
    fn from(section: SectionRef) -> Self {
        Self::Section(section)
    }
}

impl From<ProviderRef> for Child {
    fn from(provider: ProviderRef) -> Self {
        Self::Provider(provider)
    }
}

/// Offset of `provider` among `children`, counting sections of every child
/// that precedes the one containing it.
pub(crate) fn offset_among(children: &[Child], provider: ProviderId) -> Option<usize> {
    let mut offset = 0;
    for child in children {
        if let Some(inner) = child.contains_provider(provider) {
            return Some(offset + inner);
        }
        offset += child.number_of_sections();
    }
    None
}

/// Number of sections contributed by `children[..index]`.
pub(crate) fn sections_before(children: &[Child], index: usize) -> usize {
    children[..index].iter().map(Child::number_of_sections).sum()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Delegate observer shared by provider tests.

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum ProviderEvent {
        Begin(ProviderId),
        End(ProviderId),
        Invalidate(ProviderId),
        Inserted(ProviderId, Vec<usize>),
        Removed(ProviderId, Vec<usize>),
    }

    #[derive(Default)]
    pub(crate) struct ProviderObserver {
        pub(crate) events: Mutex<Vec<ProviderEvent>>,
    }

    impl ProviderObserver {
        pub(crate) fn attach(provider: &dyn SectionProvider) -> Arc<Self> {
            let observer = Arc::new(Self::default());
            let delegate: Arc<dyn SectionProviderUpdateDelegate> = observer.clone();
            provider.set_update_delegate(Some(Arc::downgrade(&delegate)));
            observer
        }

        pub(crate) fn take(&self) -> Vec<ProviderEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl SectionProviderUpdateDelegate for ProviderObserver {
        fn will_begin_updating(&self, provider: &dyn SectionProvider) {
            self.events.lock().push(ProviderEvent::Begin(provider.id()));
        }

        fn did_end_updating(&self, provider: &dyn SectionProvider) {
            self.events.lock().push(ProviderEvent::End(provider.id()));
        }

        fn invalidate_all(&self, provider: &dyn SectionProvider) {
            self.events.lock().push(ProviderEvent::Invalidate(provider.id()));
        }

        fn did_insert_sections(
            &self,
            provider: &dyn SectionProvider,
            _sections: &[SectionRef],
            indexes: &IndexSet,
        ) {
            self.events.lock().push(ProviderEvent::Inserted(
                provider.id(),
                indexes.iter().copied().collect(),
            ));
        }

        fn did_remove_sections(
            &self,
            provider: &dyn SectionProvider,
            _sections: &[SectionRef],
            indexes: &IndexSet,
        ) {
            self.events.lock().push(ProviderEvent::Removed(
                provider.id(),
                indexes.iter().copied().collect(),
            ));
        }
    }
}
