//! Core systems for Strata.
//!
//! This crate provides the infrastructure the composition layer is built on:
//!
//! - **Signal/Slot System**: Type-safe, re-entrant notification delivery
//! - **Thread Affinity**: Assertions that a tree is only touched from one thread
//! - **Logging**: `tracing` targets, tree visualization, performance spans
//! - **Errors**: The structural-misuse taxonomy shared by every node type
//!
//! # Signal/Slot Example
//!
//! ```
//! use strata_core::Signal;
//!
//! let sections_removed = Signal::<Vec<usize>>::new();
//!
//! let conn_id = sections_removed.connect(|indexes| {
//!     println!("removed sections {indexes:?}");
//! });
//!
//! sections_removed.emit(vec![2]);
//! sections_removed.disconnect(conn_id);
//! ```

mod error;
pub mod logging;
pub mod signal;
pub mod thread_check;

pub use error::{Error, Result, SignalError};
pub use logging::{DebugNode, PerfSpan, TreeDebug, TreeFormatOptions, TreeStyle};
pub use signal::{ConnectionId, Signal};
pub use thread_check::ThreadAffinity;
