//! Owner-thread checks.
//!
//! Observable collections are `Send + Sync` so they can be stored in shared
//! view-models, but they are meant to be mutated from the single thread that
//! drives the UI. [`ThreadAffinity`] remembers the creating thread; mutating
//! entry points call [`debug_check`](ThreadAffinity::debug_check) so misuse
//! fails loudly in debug builds and costs nothing in release builds.

use std::thread::{self, ThreadId};

/// The thread an object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Binds to the calling thread.
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// The owning thread.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns `true` on the owning thread.
    #[inline]
    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Panics if called off the owning thread. `operation` names the entry
    /// point in the panic message.
    pub fn check(&self, operation: &str) {
        if !self.is_owner() {
            wrong_thread(self.owner, operation);
        }
    }

    /// [`check`](Self::check) in debug builds, nothing in release builds.
    #[inline]
    pub fn debug_check(&self, operation: &str) {
        if cfg!(debug_assertions) {
            self.check(operation);
        }
    }
}

#[cold]
#[inline(never)]
fn wrong_thread(owner: ThreadId, operation: &str) -> ! {
    let current = thread::current();
    panic!(
        "`{operation}` called on thread {:?} ({}), but the object belongs to thread {owner:?}",
        current.id(),
        current.name().unwrap_or("unnamed"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_thread_passes() {
        let affinity = ThreadAffinity::current();
        assert!(affinity.is_owner());
        assert_eq!(affinity.owner(), thread::current().id());
        affinity.check("add");
        affinity.debug_check("add");
    }

    #[test]
    fn test_other_thread_is_detected() {
        let affinity = ThreadAffinity::current();
        let seen_as_owner = thread::spawn(move || affinity.is_owner()).join().unwrap();
        assert!(!seen_as_owner);
    }

    #[test]
    fn test_check_panics_with_operation_name() {
        let affinity = ThreadAffinity::current();
        let outcome = thread::spawn(move || affinity.check("remove_at")).join();
        let payload = outcome.unwrap_err();
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.contains("remove_at"));
    }
}
