//! Observable values.
//!
//! A [`Property`] stores a value behind a lock and reports whether a write
//! actually changed it. It does not notify anyone by itself: the owner pairs
//! it with a [`Signal`](crate::Signal) and emits only when a write returns
//! `true`, which keeps repeated writes of the same value silent.
//!
//! ```
//! use mailview_core::{Property, Signal};
//!
//! struct SearchBox {
//!     text: Property<String>,
//!     text_changed: Signal<String>,
//! }
//!
//! impl SearchBox {
//!     fn type_text(&self, text: &str) {
//!         if self.text.set(text.to_string()) {
//!             self.text_changed.emit(text.to_string());
//!         }
//!     }
//! }
//!
//! let search = SearchBox { text: Property::new(String::new()), text_changed: Signal::new() };
//! search.type_text("inbox");
//! search.type_text("inbox");
//! assert_eq!(search.text.get(), "inbox");
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A value with change detection on write.
pub struct Property<T> {
    current: RwLock<T>,
}

impl<T> Property<T> {
    /// Wraps an initial value.
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Runs `f` against the stored value while holding a read lock.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.current.read();
        f(&guard)
    }

    /// Overwrites the value unconditionally.
    pub fn set_silent(&self, value: T) {
        *self.current.write() = value;
    }
}

impl<T: Clone> Property<T> {
    /// Returns a copy of the stored value.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: PartialEq> Property<T> {
    /// Stores `value` if it differs from the current one.
    ///
    /// Returns `true` when the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut guard = self.current.write();
        if *guard == value {
            return false;
        }
        *guard = value;
        true
    }
}

impl<T: Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|value| f.debug_tuple("Property").field(value).finish())
    }
}
