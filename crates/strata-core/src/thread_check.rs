//! Thread affinity verification for Strata.
//!
//! A section/provider tree is mutated from exactly one logical thread (the UI
//! thread). Nothing enforces this at runtime through locking; instead, the
//! objects that sit at the root of a tree record the thread they were created
//! on and assert it whenever a notification passes through them.
//!
//! # Usage
//!
//! ```
//! use strata_core::thread_check::ThreadAffinity;
//!
//! struct Root {
//!     affinity: ThreadAffinity,
//! }
//!
//! impl Root {
//!     fn notify(&self) {
//!         self.affinity.debug_assert_same_thread();
//!         // ... translate and forward ...
//!     }
//! }
//!
//! let root = Root { affinity: ThreadAffinity::current() };
//! root.notify();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

/// Flag to enable/disable runtime thread checks globally.
static THREAD_CHECKS_ENABLED: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

/// Enable or disable runtime thread checks.
///
/// By default, thread checks are enabled in debug builds and disabled in
/// release builds.
pub fn set_thread_checks_enabled(enabled: bool) {
    THREAD_CHECKS_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Check if runtime thread checks are currently enabled.
#[inline]
pub fn are_thread_checks_enabled() -> bool {
    THREAD_CHECKS_ENABLED.load(Ordering::Relaxed)
}

/// Thread affinity tracker for tree roots.
///
/// Records the thread on which an object was created and verifies that
/// subsequent operations occur on the same thread.
#[derive(Debug, Clone, Copy)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Create a new thread affinity tracker for the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// Get the thread ID this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread matches this affinity.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Assert that we are on the same thread as the affinity.
    ///
    /// Runs in every build profile.
    ///
    /// # Panics
    ///
    /// Panics with a descriptive message if called from a different thread.
    #[inline]
    pub fn assert_same_thread(&self) {
        self.assert_same_thread_with_msg("section tree accessed from wrong thread")
    }

    /// Assert that we are on the same thread, with a custom message.
    ///
    /// # Panics
    ///
    /// Panics if called from a different thread.
    pub fn assert_same_thread_with_msg(&self, msg: &str) {
        if !self.is_same_thread() {
            self.panic_wrong_thread(msg);
        }
    }

    /// Assertion that only runs while thread checks are enabled.
    ///
    /// Thread checks default to on in debug builds and off in release builds.
    #[inline]
    pub fn debug_assert_same_thread(&self) {
        if are_thread_checks_enabled() {
            self.assert_same_thread();
        }
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self, msg: &str) -> ! {
        let current = std::thread::current();
        let current_name = current.name().unwrap_or("<unnamed>");
        let current_id = current.id();

        tracing::error!(
            target: "strata_core::thread_check",
            owner = ?self.thread_id,
            current = ?current_id,
            "{msg}"
        );

        panic!(
            "\n\
            ══════════════════════════════════════════════════════════════════════\n\
            THREAD AFFINITY VIOLATION\n\
            ══════════════════════════════════════════════════════════════════════\n\
            \n\
            {msg}\n\
            \n\
            Tree was created on thread: {:?}\n\
            Current thread: \"{current_name}\" (ID: {current_id:?})\n\
            \n\
            Sections, providers and their mapping must only be mutated from\n\
            the thread that owns the collection view. Batches are serialized\n\
            by convention, not by locking, so a mutation from another thread\n\
            can interleave with an open batch and corrupt the changeset.\n\
            \n\
            ══════════════════════════════════════════════════════════════════════",
            self.thread_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_thread_affinity_same_thread() {
        let affinity = ThreadAffinity::current();
        assert!(affinity.is_same_thread());
        affinity.assert_same_thread();
    }

    #[test]
    fn test_thread_affinity_different_thread() {
        let affinity = ThreadAffinity::current();

        let result = Arc::new(AtomicBool::new(false));
        let result_clone = result.clone();

        std::thread::spawn(move || {
            result_clone.store(!affinity.is_same_thread(), Ordering::SeqCst);
        })
        .join()
        .unwrap();

        assert!(
            result.load(Ordering::SeqCst),
            "is_same_thread() should return false from different thread"
        );
    }

    #[test]
    fn test_thread_affinity_panic_on_wrong_thread() {
        let affinity = ThreadAffinity::current();

        let result = std::thread::spawn(move || {
            affinity.assert_same_thread();
        })
        .join();

        assert!(result.is_err(), "Expected thread to panic with affinity violation");
    }

    #[test]
    fn test_thread_affinity_default() {
        let affinity = ThreadAffinity::default();
        assert!(affinity.is_same_thread());
        affinity.debug_assert_same_thread();
    }

    #[test]
    fn test_disabled_checks_allow_foreign_thread() {
        let affinity = ThreadAffinity::current();
        let enabled = are_thread_checks_enabled();

        set_thread_checks_enabled(false);
        assert!(!are_thread_checks_enabled());
        let result = std::thread::spawn(move || affinity.debug_assert_same_thread()).join();
        set_thread_checks_enabled(enabled);

        assert!(result.is_ok(), "disabled checks must not panic");
        assert_eq!(are_thread_checks_enabled(), enabled);
    }
}
