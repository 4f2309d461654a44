//! Change notifications for managed collections.
//!
//! Views bind to two signals:
//!
//! - `collection_changed` carries fine-grained [`CollectionChange`] events
//!   expressed in view indices. Applying the events in emission order to a
//!   mirror of the view keeps the mirror identical to the view.
//! - `property_changed` names a derived property ([`CollectionProperty`])
//!   whose value may have changed.
//!
//! # Signal Usage
//!
//! - **Item added/removed/moved/replaced**: one event per contiguous run
//! - **Filter or sort replaced, collection cleared**: `Reset`
//! - **Reconciliation**: never `Reset`

use mailview_core::Signal;

/// A single change to the visible items of a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    /// `items` were inserted starting at `index`.
    Add { index: usize, items: Vec<T> },
    /// `items` were removed starting at `index`.
    Remove { index: usize, items: Vec<T> },
    /// `item` moved from `from` to `to`, where `to` is its index after the move.
    Move { from: usize, to: usize, item: T },
    /// The item at `index` was replaced by a changed value.
    Replace { index: usize, old: T, new: T },
    /// The view changed wholesale; observers must re-read it.
    Reset,
}

impl<T> CollectionChange<T> {
    /// Returns `true` for [`CollectionChange::Reset`].
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }
}

impl<T: Clone> CollectionChange<T> {
    /// Applies this change to a mirror of the view.
    ///
    /// Returns `false` for `Reset`, in which case the mirror must be reloaded
    /// from the collection.
    ///
    /// # Panics
    ///
    /// Panics if the event does not fit the mirror, which means the mirror
    /// was already out of sync.
    pub fn apply(&self, mirror: &mut Vec<T>) -> bool {
        match self {
            Self::Add { index, items } => {
                mirror.splice(*index..*index, items.iter().cloned());
            }
            Self::Remove { index, items } => {
                mirror.drain(*index..*index + items.len());
            }
            Self::Move { from, to, .. } => {
                let item = mirror.remove(*from);
                mirror.insert(*to, item);
            }
            Self::Replace { index, new, .. } => {
                mirror[*index] = new.clone();
            }
            Self::Reset => return false,
        }
        true
    }
}

/// Properties of a collection that raise `property_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionProperty {
    /// Number of visible items.
    Count,
    /// Whether a change batch is in progress.
    IsChanging,
    /// The predicate filter.
    ItemsFilter,
    /// The observable search filter.
    SearchFilter,
    /// The active comparer.
    ItemsComparer,
    /// The list of offered sorting variants.
    SortingVariants,
    /// The index of the selected sorting variant.
    SelectedSortingIndex,
}

/// Collection of signals emitted by managed collections.
pub struct CollectionSignals<T> {
    /// Emitted after the view changed.
    pub collection_changed: Signal<CollectionChange<T>>,

    /// Emitted after a derived property changed.
    pub property_changed: Signal<CollectionProperty>,
}

impl<T: 'static> Default for CollectionSignals<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> CollectionSignals<T> {
    /// Creates a new set of collection signals.
    pub fn new() -> Self {
        Self {
            collection_changed: Signal::new(),
            property_changed: Signal::new(),
        }
    }

    /// Emits every change in order.
    pub fn emit_changes(&self, changes: Vec<CollectionChange<T>>) {
        for change in changes {
            self.collection_changed.emit(change);
        }
    }

    /// Emits `property_changed` for one property.
    pub fn emit_property(&self, property: CollectionProperty) {
        self.property_changed.emit(property);
    }
}

/// Merges adjacent events that describe one contiguous run.
///
/// Consecutive `Add` events where each continues right after the previous
/// run become one `Add`. Consecutive `Remove` events at the same index
/// (forward removal) or at the index just before (backward removal) become
/// one `Remove`. Other events are kept as they are.
pub fn coalesce<T>(changes: Vec<CollectionChange<T>>) -> Vec<CollectionChange<T>> {
    let mut merged: Vec<CollectionChange<T>> = Vec::with_capacity(changes.len());

    for change in changes {
        match (merged.last_mut(), change) {
            (
                Some(CollectionChange::Add { index, items }),
                CollectionChange::Add {
                    index: next,
                    items: more,
                },
            ) if next == *index + items.len() => {
                items.extend(more);
            }
            (
                Some(CollectionChange::Remove { index, items }),
                CollectionChange::Remove {
                    index: next,
                    items: more,
                },
            ) if next == *index || next + more.len() == *index => {
                if next == *index {
                    items.extend(more);
                } else {
                    let mut run = more;
                    run.append(items);
                    *items = run;
                    *index = next;
                }
            }
            (_, change) => merged.push(change),
        }
    }

    merged
}
