//! Error types for Strata.
//!
//! Every error here describes caller misuse of the tree's invariants. There
//! are no I/O or environmental failures anywhere in the composition layer.
//! Fail-fast entry points (`insert`, `remove_at`, ...) panic with the
//! `Display` text of these errors; the matching `try_*` entry points return
//! them instead.

/// Result type alias for Strata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural misuse of a section/provider tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A positional insert or removal addressed a slot outside the container.
    #[error("Index {index} is out of bounds for a container of {len} children")]
    IndexOutOfBounds {
        /// The requested position.
        index: usize,
        /// The number of children at the time of the call.
        len: usize,
    },

    /// The child passed to a removal is not a direct child of the container.
    #[error("Child is not a direct member of this container")]
    ChildNotFound,

    /// A provider was expected to be part of the mapped hierarchy but is not.
    #[error("Provider {0} is not part of the mapped hierarchy")]
    ProviderNotInTree(u64),

    /// A batch was ended without a matching begin.
    #[error("Batch ended without a matching begin")]
    UnbalancedBatch,

    /// Signal-related error.
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),
}

impl Error {
    /// Create an out-of-bounds error.
    pub fn out_of_bounds(index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }

    /// Returns `true` if the error is an out-of-bounds position.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::IndexOutOfBounds { .. })
    }
}

/// Signal-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// The connection ID is invalid or has already been disconnected.
    #[error("Invalid or disconnected connection ID")]
    InvalidConnection,
}
