//! Synchronous change notification.
//!
//! A [`Signal`] is a list of callbacks ("slots") that all run, in connection
//! order, whenever the owner emits a value. Delivery is synchronous and
//! happens on the emitting thread.
//!
//! ```
//! use mailview_core::Signal;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let unread_changed = Signal::<usize>::new();
//! let latest = Arc::new(AtomicUsize::new(0));
//!
//! let sink = latest.clone();
//! let id = unread_changed.connect(move |count| sink.store(*count, Ordering::SeqCst));
//! unread_changed.emit(3);
//! assert_eq!(latest.load(Ordering::SeqCst), 3);
//!
//! unread_changed.disconnect(id);
//! unread_changed.emit(5);
//! assert_eq!(latest.load(Ordering::SeqCst), 3);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Handle of one connected slot, used to disconnect it.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A set of slots invoked with a borrowed `Args` on every emission.
///
/// Emitting copies the slot list and releases the internal lock before the
/// first slot runs. Slots may therefore connect, disconnect or emit on the
/// same signal; a slot connected during an emission first runs on the next
/// one.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Creates a signal without slots.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Adds a slot and returns its handle.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Removes a slot. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Invokes every connected slot with `args`.
    pub fn emit(&self, args: Args) {
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        if slots.is_empty() {
            return;
        }
        tracing::trace!(target: targets::SIGNAL, slots = slots.len(), "emit");
        for slot in &slots {
            slot(&args);
        }
    }
}

impl<Args> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Folder {
        Inbox,
        Archive,
    }

    fn recorder<T: Clone + Send + 'static>(signal: &Signal<T>) -> (ConnectionId, Arc<Mutex<Vec<T>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = signal.connect(move |value: &T| sink.lock().push(value.clone()));
        (id, seen)
    }

    #[test]
    fn test_slots_run_in_connection_order() {
        let signal = Signal::<Folder>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = order.clone();
            signal.connect(move |_| order.lock().push(tag));
        }

        signal.emit(Folder::Inbox);
        assert_eq!(*order.lock(), ["first", "second"]);
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let signal = Signal::<Folder>::new();
        let (id, seen) = recorder(&signal);

        signal.emit(Folder::Inbox);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(Folder::Archive);

        assert_eq!(*seen.lock(), [Folder::Inbox]);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_slot_may_disconnect_itself() {
        let signal = Arc::new(Signal::<()>::new());
        let calls = Arc::new(Mutex::new(0));
        let own_id = Arc::new(Mutex::new(None::<ConnectionId>));

        let weak = Arc::downgrade(&signal);
        let (calls_in_slot, id_in_slot) = (calls.clone(), own_id.clone());
        let id = signal.connect(move |_| {
            *calls_in_slot.lock() += 1;
            if let (Some(signal), Some(id)) = (weak.upgrade(), *id_in_slot.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(());
        signal.emit(());
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_reentrant_emit() {
        let signal = Arc::new(Signal::<u8>::new());
        let (_, seen) = recorder(&signal);

        let weak = Arc::downgrade(&signal);
        signal.connect(move |&depth| {
            if depth < 2 {
                if let Some(signal) = weak.upgrade() {
                    signal.emit(depth + 1);
                }
            }
        });

        signal.emit(0);
        assert_eq!(*seen.lock(), [0, 1, 2]);
    }

    #[test]
    fn test_debug_shows_connection_count() {
        let signal = Signal::<()>::default();
        signal.connect(|_| {});
        assert_eq!(format!("{signal:?}"), "Signal { connections: 1 }");
    }
}
