//! The managed collection.
//!
//! A [`ManagedCollection`] owns an ordered list of source items ("original
//! items") and exposes a filtered, sorted projection of it (the "view") that
//! UI layers bind to. The view is kept equal to
//! `original.filter(filter).filter(search_filter).sorted_by(comparer)` after
//! every public operation, with ties kept in source order.
//!
//! The centrepiece is reconciliation: replacing the source list with a freshly
//! loaded sequence while keeping the instances that are "the same" under the
//! comparer, moving rather than re-adding reordered items, and never resetting
//! the view.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mailview::{FnComparer, ManagedCollection};
//!
//! let contacts = ManagedCollection::<String>::new();
//! contacts.set_comparer(Arc::new(FnComparer::new(|a: &String, b: &String| a.cmp(b))));
//!
//! contacts.add_range(["Carol".to_string(), "Alice".to_string()]);
//! assert_eq!(contacts.to_vec(), ["Alice", "Carol"]);
//!
//! contacts.reconcile_original_items(["Bob".to_string(), "Carol".to_string()]);
//! assert_eq!(contacts.original_items(), ["Bob", "Carol"]);
//! assert_eq!(contacts.to_vec(), ["Bob", "Carol"]);
//! ```
//!
//! # Threading
//!
//! The collection is `Send + Sync` and usually shared through an `Arc`, but
//! its mutating methods belong to the thread that created it; debug builds
//! assert this. Filters and comparers are evaluated while the internal state
//! is locked and must not call back into the collection. Signal slots and
//! update callbacks run with no lock held.

mod builder;
mod reconcile;
mod state;

pub use builder::ManagedCollectionBuilder;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use mailview_core::logging::targets;
use mailview_core::{ConnectionId, PerfSpan, Property, ThreadAffinity};
use parking_lot::{Mutex, RwLock};

use crate::comparer::{ItemComparer, SortingVariant};
use crate::error::{BoxError, CollectionError, Result};
use crate::filter::{ItemFilter, SearchFilter};
use crate::notify::{CollectionChange, CollectionProperty, CollectionSignals, coalesce};

use self::state::CollectionState;

/// Bounds required of items stored in a managed collection.
///
/// Implemented for every type that satisfies them.
pub trait CollectionItem: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> CollectionItem for T {}

type UpdateFn<'a, T> = dyn FnMut(&mut T, &T) -> std::result::Result<(), BoxError> + 'a;

struct Shared<T: CollectionItem> {
    state: RwLock<CollectionState<T>>,
    signals: CollectionSignals<T>,
    changing: AtomicUsize,
    sorting_variants: RwLock<Vec<SortingVariant<T>>>,
    selected_sorting_index: Property<Option<usize>>,
    search_connection: Mutex<Option<ConnectionId>>,
    affinity: ThreadAffinity,
}

impl<T: CollectionItem> Shared<T> {
    fn view_len(&self) -> usize {
        self.state.read().view.len()
    }

    fn emit_count_if_changed(&self, before: usize) {
        if self.view_len() != before {
            self.signals.emit_property(CollectionProperty::Count);
        }
    }

    /// Emits recorded changes and a `Count` notification if the view length moved.
    fn publish(&self, changes: Vec<CollectionChange<T>>, before: usize, after: usize) {
        self.signals.emit_changes(changes);
        if before != after {
            self.signals.emit_property(CollectionProperty::Count);
        }
    }

    /// Applies `update` to the state, rebuilds the view and announces a reset.
    fn rebuild_view<F>(&self, reason: &'static str, update: F)
    where
        F: FnOnce(&mut CollectionState<T>),
    {
        let _span = PerfSpan::new("rebuild_view");
        let (before, after) = {
            let mut state = self.state.write();
            let before = state.view.len();
            update(&mut *state);
            state.rebuild();
            (before, state.view.len())
        };
        tracing::debug!(target: targets::COLLECTION, reason, before, after, "view rebuilt");
        self.publish(vec![CollectionChange::Reset], before, after);
    }

    fn connect_search_filter(self: &Arc<Self>, filter: &Arc<dyn SearchFilter<T>>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let id = filter.changed().connect(move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.rebuild_view("search filter changed", |_| {});
            }
        });
        *self.search_connection.lock() = Some(id);
    }

    fn disconnect_search_filter(&self) {
        let id = self.search_connection.lock().take();
        let filter = self.state.read().search_filter.clone();
        if let (Some(id), Some(filter)) = (id, filter) {
            filter.changed().disconnect(id);
        }
    }

    fn start_changing(&self) {
        if self.changing.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::debug!(target: targets::COLLECTION, "change batch started");
            self.signals.emit_property(CollectionProperty::IsChanging);
        }
    }

    fn end_changing(&self) {
        let mut depth = self.changing.load(Ordering::SeqCst);
        loop {
            if depth == 0 {
                tracing::warn!(
                    target: targets::COLLECTION,
                    "end_changing called without a matching start_changing"
                );
                return;
            }
            match self.changing.compare_exchange(
                depth,
                depth - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(current) => depth = current,
            }
        }

        if depth == 1 {
            tracing::debug!(target: targets::COLLECTION, "change batch finished");
            self.signals.emit_property(CollectionProperty::IsChanging);
        }
    }
}

/// An observable, filtered and sorted projection of a source list.
///
/// Cloning items is expected to be cheap; item types with identity (records
/// loaded from storage) are usually stored as `Arc<Record>`.
pub struct ManagedCollection<T: CollectionItem> {
    shared: Arc<Shared<T>>,
}

static_assertions::assert_impl_all!(ManagedCollection<String>: Send, Sync);

impl<T: CollectionItem> Default for ManagedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CollectionItem> ManagedCollection<T> {
    /// Creates an empty collection with no filter and no comparer.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(CollectionState::new()),
                signals: CollectionSignals::new(),
                changing: AtomicUsize::new(0),
                sorting_variants: RwLock::new(Vec::new()),
                selected_sorting_index: Property::new(None),
                search_connection: Mutex::new(None),
                affinity: ThreadAffinity::current(),
            }),
        }
    }

    /// Starts building a collection with initial items and settings.
    pub fn builder() -> ManagedCollectionBuilder<T> {
        ManagedCollectionBuilder::new()
    }

    /// Signals emitted by this collection.
    pub fn signals(&self) -> &CollectionSignals<T> {
        &self.shared.signals
    }

    // ---------------------------------------------------------------------
    // View access
    // ---------------------------------------------------------------------

    /// Number of visible items.
    pub fn len(&self) -> usize {
        self.shared.view_len()
    }

    /// Returns `true` if no item is visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the visible item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.shared.state.read().view_item(index).cloned()
    }

    /// Snapshot of the visible items in view order.
    pub fn to_vec(&self) -> Vec<T> {
        self.shared.state.read().view_items().cloned().collect()
    }

    /// Iterates over a snapshot of the visible items.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    /// Gives `f` borrowed access to the visible items.
    ///
    /// The state is read-locked while `f` runs, so `f` must not mutate the
    /// collection.
    pub fn with_items<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[&T]) -> R,
    {
        let state = self.shared.state.read();
        let items: Vec<&T> = state.view_items().collect();
        f(&items)
    }

    /// View index of the first visible item equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.shared.state.read().view_items().position(|other| other == item)
    }

    /// Returns `true` if an item equal to `item` is visible.
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Snapshot of the source items, unfiltered and in source order.
    pub fn original_items(&self) -> Vec<T> {
        self.shared.state.read().original.clone()
    }

    /// Number of source items.
    pub fn original_len(&self) -> usize {
        self.shared.state.read().original.len()
    }

    // ---------------------------------------------------------------------
    // Source mutation
    // ---------------------------------------------------------------------

    /// Appends an item to the source list.
    pub fn add(&self, item: T) {
        self.shared.affinity.debug_check("add");
        let mut changes = Vec::new();
        let (before, after) = {
            let mut state = self.shared.state.write();
            let before = state.view.len();
            let position = state.original.len();
            state.insert_source(position, item, &mut changes);
            (before, state.view.len())
        };
        tracing::trace!(target: targets::COLLECTION, visible = (before != after), "item added");
        self.shared.publish(changes, before, after);
    }

    /// Appends items in order, merging the view notifications of contiguous runs.
    pub fn add_range(&self, items: impl IntoIterator<Item = T>) {
        self.shared.affinity.debug_check("add_range");
        let mut changes = Vec::new();
        let (before, after, added) = {
            let mut state = self.shared.state.write();
            let before = state.view.len();
            let mut added = 0;
            for item in items {
                let position = state.original.len();
                state.insert_source(position, item, &mut changes);
                added += 1;
            }
            (before, state.view.len(), added)
        };
        tracing::trace!(target: targets::COLLECTION, added, "items added");
        self.shared.publish(coalesce(changes), before, after);
    }

    /// Inserts an item at a source position, clamped to the end of the list.
    pub fn insert(&self, index: usize, item: T) {
        self.shared.affinity.debug_check("insert");
        let mut changes = Vec::new();
        let (before, after) = {
            let mut state = self.shared.state.write();
            let before = state.view.len();
            let position = index.min(state.original.len());
            state.insert_source(position, item, &mut changes);
            (before, state.view.len())
        };
        self.shared.publish(changes, before, after);
    }

    /// Removes the first source item equal to `item`.
    ///
    /// Returns `false` if no such item exists.
    pub fn remove(&self, item: &T) -> bool {
        self.shared.affinity.debug_check("remove");
        let mut changes = Vec::new();
        let (before, after) = {
            let mut state = self.shared.state.write();
            let Some(position) = state.original.iter().position(|other| other == item) else {
                return false;
            };
            let before = state.view.len();
            state.remove_source(position, &mut changes);
            (before, state.view.len())
        };
        self.shared.publish(changes, before, after);
        true
    }

    /// Removes and returns the source item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.shared.affinity.debug_check("remove_at");
        let mut changes = Vec::new();
        let (removed, before, after) = {
            let mut state = self.shared.state.write();
            let len = state.original.len();
            if index >= len {
                return Err(CollectionError::index_out_of_range(index, len));
            }
            let before = state.view.len();
            let removed = state.remove_source(index, &mut changes);
            (removed, before, state.view.len())
        };
        self.shared.publish(changes, before, after);
        Ok(removed)
    }

    /// Moves a source item from `from` to `to` (its index after the move).
    ///
    /// The view reports a `Move` only if the visible position changes.
    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        self.shared.affinity.debug_check("move_item");
        let mut changes = Vec::new();
        {
            let mut state = self.shared.state.write();
            let len = state.original.len();
            if from >= len {
                return Err(CollectionError::index_out_of_range(from, len));
            }
            if to >= len {
                return Err(CollectionError::index_out_of_range(to, len));
            }
            state.move_source(from, to, &mut changes);
        }
        self.shared.signals.emit_changes(changes);
        Ok(())
    }

    /// Removes every item, announcing a single reset.
    pub fn clear(&self) {
        self.shared.affinity.debug_check("clear");
        let before = {
            let mut state = self.shared.state.write();
            let before = state.view.len();
            state.clear();
            before
        };
        tracing::debug!(target: targets::COLLECTION, removed = before, "collection cleared");
        self.shared.publish(vec![CollectionChange::Reset], before, 0);
    }

    /// Re-evaluates membership and position of an item whose state changed
    /// in place (for example through interior mutability).
    ///
    /// Does nothing if no equal item is in the source list.
    pub fn refilter_item(&self, item: &T) {
        self.refilter_items(std::slice::from_ref(item));
    }

    /// Re-evaluates several items that changed in place, as one batch.
    pub fn refilter_items(&self, items: &[T]) {
        self.shared.affinity.debug_check("refilter_items");
        let mut changes = Vec::new();
        let (before, after) = {
            let mut state = self.shared.state.write();
            let mut positions: Vec<usize> = Vec::with_capacity(items.len());
            for item in items {
                if let Some(position) = state.original.iter().position(|other| other == item) {
                    if !positions.contains(&position) {
                        positions.push(position);
                    }
                }
            }

            let before = state.view.len();
            for (k, &position) in positions.iter().enumerate() {
                state.refilter_source(position, None, &positions[k + 1..], &mut changes);
            }
            (before, state.view.len())
        };
        self.shared.publish(changes, before, after);
    }

    /// Mutates the source item at `index` in place, then refilters it.
    ///
    /// `f` runs without the state lock held. A `Replace` is reported if the
    /// value changed and the item is visible.
    pub fn modify<F, R>(&self, index: usize, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        self.shared.affinity.debug_check("modify");
        let mut item = {
            let state = self.shared.state.read();
            let len = state.original.len();
            state
                .original
                .get(index)
                .cloned()
                .ok_or_else(|| CollectionError::index_out_of_range(index, len))?
        };

        let result = f(&mut item);

        let mut changes = Vec::new();
        let (before, after) = {
            let mut state = self.shared.state.write();
            let len = state.original.len();
            if index >= len {
                return Err(CollectionError::index_out_of_range(index, len));
            }
            let before = state.view.len();
            state.replace_source(index, item, &mut changes);
            (before, state.view.len())
        };
        self.shared.publish(changes, before, after);
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Change batches
    // ---------------------------------------------------------------------

    /// Enters a change batch. Nested calls are counted.
    ///
    /// `IsChanging` is announced on the outermost call only.
    pub fn start_changing(&self) {
        self.shared.start_changing();
    }

    /// Leaves a change batch. An unbalanced call is logged and ignored.
    pub fn end_changing(&self) {
        self.shared.end_changing();
    }

    /// Enters a change batch that ends when the returned guard is dropped,
    /// including during unwinding.
    pub fn begin_changes(&self) -> ChangeGuard<'_, T> {
        self.shared.start_changing();
        ChangeGuard { collection: self }
    }

    /// Returns `true` while a change batch is in progress.
    pub fn is_changing(&self) -> bool {
        self.shared.changing.load(Ordering::SeqCst) > 0
    }

    // ---------------------------------------------------------------------
    // Filtering and sorting
    // ---------------------------------------------------------------------

    /// The predicate filter, if any.
    pub fn filter(&self) -> Option<Arc<dyn ItemFilter<T>>> {
        self.shared.state.read().filter.clone()
    }

    /// Replaces the predicate filter and rebuilds the view.
    pub fn set_filter(&self, filter: Arc<dyn ItemFilter<T>>) {
        self.replace_filter(Some(filter));
    }

    /// Removes the predicate filter.
    pub fn clear_filter(&self) {
        self.replace_filter(None);
    }

    fn replace_filter(&self, filter: Option<Arc<dyn ItemFilter<T>>>) {
        self.shared.affinity.debug_check("set_filter");
        self.shared
            .rebuild_view("filter replaced", |state| state.filter = filter);
        self.shared.signals.emit_property(CollectionProperty::ItemsFilter);
    }

    /// The search filter, if any.
    pub fn search_filter(&self) -> Option<Arc<dyn SearchFilter<T>>> {
        self.shared.state.read().search_filter.clone()
    }

    /// Replaces the search filter and rebuilds the view.
    ///
    /// From now on every emission of the filter's `changed` signal rebuilds
    /// the view; the previous filter is no longer observed.
    pub fn set_search_filter(&self, filter: Arc<dyn SearchFilter<T>>) {
        self.replace_search_filter(Some(filter));
    }

    /// Removes the search filter.
    pub fn clear_search_filter(&self) {
        self.replace_search_filter(None);
    }

    fn replace_search_filter(&self, filter: Option<Arc<dyn SearchFilter<T>>>) {
        self.shared.affinity.debug_check("set_search_filter");
        self.shared.disconnect_search_filter();
        if let Some(filter) = &filter {
            self.shared.connect_search_filter(filter);
        }
        self.shared
            .rebuild_view("search filter replaced", |state| state.search_filter = filter);
        self.shared.signals.emit_property(CollectionProperty::SearchFilter);
    }

    /// The active comparer, if any.
    pub fn comparer(&self) -> Option<Arc<dyn ItemComparer<T>>> {
        self.shared.state.read().comparer.clone()
    }

    /// Replaces the comparer and re-sorts the view.
    ///
    /// The comparer also decides item identity during reconciliation.
    pub fn set_comparer(&self, comparer: Arc<dyn ItemComparer<T>>) {
        self.replace_comparer(Some(comparer));
    }

    /// Removes the comparer; the view falls back to source order.
    pub fn clear_comparer(&self) {
        self.replace_comparer(None);
    }

    fn replace_comparer(&self, comparer: Option<Arc<dyn ItemComparer<T>>>) {
        self.shared.affinity.debug_check("set_comparer");
        self.shared
            .rebuild_view("comparer replaced", |state| state.comparer = comparer);
        self.shared.signals.emit_property(CollectionProperty::ItemsComparer);
    }

    /// The offered sorting variants.
    pub fn sorting_variants(&self) -> Vec<SortingVariant<T>> {
        self.shared.sorting_variants.read().clone()
    }

    /// Replaces the offered sorting variants.
    ///
    /// A non-empty list selects its first variant and applies its comparer.
    /// An empty list clears the selection and leaves the comparer as it is.
    pub fn set_sorting_variants(&self, variants: Vec<SortingVariant<T>>) {
        self.shared.affinity.debug_check("set_sorting_variants");
        let first = variants.first().map(|variant| variant.comparer.clone());
        *self.shared.sorting_variants.write() = variants;
        self.shared.signals.emit_property(CollectionProperty::SortingVariants);

        let selection = first.as_ref().map(|_| 0);
        let selection_changed = self.shared.selected_sorting_index.set(selection);
        if let Some(comparer) = first {
            self.replace_comparer(Some(comparer));
        }
        if selection_changed {
            self.shared
                .signals
                .emit_property(CollectionProperty::SelectedSortingIndex);
        }
    }

    /// Index of the selected sorting variant.
    pub fn selected_sorting_index(&self) -> Option<usize> {
        self.shared.selected_sorting_index.get()
    }

    /// Selects a sorting variant and applies its comparer.
    ///
    /// Returns `false`, without notifying, if `index` is out of range or
    /// already selected.
    pub fn set_selected_sorting_index(&self, index: usize) -> bool {
        self.shared.affinity.debug_check("set_selected_sorting_index");
        let Some(comparer) = self
            .shared
            .sorting_variants
            .read()
            .get(index)
            .map(|variant| variant.comparer.clone())
        else {
            tracing::debug!(
                target: targets::COLLECTION,
                index,
                "ignoring out of range sorting index"
            );
            return false;
        };

        if !self.shared.selected_sorting_index.set(Some(index)) {
            return false;
        }
        self.replace_comparer(Some(comparer));
        self.shared
            .signals
            .emit_property(CollectionProperty::SelectedSortingIndex);
        true
    }

    /// Re-derives the view from the source items.
    pub async fn refresh(&self) {
        self.shared.affinity.debug_check("refresh");
        self.shared.rebuild_view("refresh", |_| {});
    }

    // ---------------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------------

    /// Makes the source list equal to `target`, keeping the existing
    /// instance of every item that matches one in `target`.
    ///
    /// Items match when the comparer reports them equal, or by `PartialEq`
    /// when no comparer is set. Matched items that changed relative order are
    /// moved; the view never resets.
    pub fn reconcile_original_items(&self, target: impl IntoIterator<Item = T>) {
        self.shared.affinity.debug_check("reconcile_original_items");
        let _batch = self.begin_changes();
        let before = self.shared.view_len();
        self.reconcile_structure(target.into_iter().collect());
        self.shared.emit_count_if_changed(before);
    }

    /// Like [`reconcile_original_items`](Self::reconcile_original_items),
    /// then calls `update(kept, fresh)` for every matched pair so the kept
    /// instance can take over fresh data.
    ///
    /// Each updated item is refiltered and re-sorted. `update` is never
    /// called for inserted items. The first error stops the remaining
    /// updates; work done before it stays committed.
    pub fn try_reconcile_original_items<F, E>(
        &self,
        target: impl IntoIterator<Item = T>,
        mut update: F,
    ) -> Result<()>
    where
        F: FnMut(&mut T, &T) -> std::result::Result<(), E>,
        E: Into<BoxError>,
    {
        self.shared.affinity.debug_check("try_reconcile_original_items");
        let _batch = self.begin_changes();
        let before = self.shared.view_len();
        let incoming = self.reconcile_structure(target.into_iter().collect());
        let mut boxed = |kept: &mut T, fresh: &T| -> std::result::Result<(), BoxError> {
            update(kept, fresh).map_err(Into::into)
        };
        let outcome = self.apply_updates(&incoming, &mut boxed);
        self.shared.emit_count_if_changed(before);
        outcome
    }

    /// Infallible form of
    /// [`try_reconcile_original_items`](Self::try_reconcile_original_items).
    pub fn reconcile_original_items_with<F>(&self, target: impl IntoIterator<Item = T>, mut update: F)
    where
        F: FnMut(&mut T, &T),
    {
        let outcome = self.try_reconcile_original_items(target, |kept: &mut T, fresh: &T| {
            update(kept, fresh);
            Ok::<(), BoxError>(())
        });
        debug_assert!(outcome.is_ok());
    }

    /// Removes, moves and inserts source items so the list matches `target`.
    ///
    /// Returns `target` with inserted items taken out; what remains are the
    /// fresh counterparts of matched items, at their target positions.
    fn reconcile_structure(&self, target: Vec<T>) -> Vec<Option<T>> {
        let _span = PerfSpan::new("reconcile");
        let mut changes = Vec::new();

        let (incoming, plan) = {
            let mut state = self.shared.state.write();
            let plan = reconcile::plan(&state.original, &target, state.comparer.as_deref());
            let mut incoming: Vec<Option<T>> = target.into_iter().map(Some).collect();

            if !plan.is_identity() {
                for old in (0..plan.old_to_new.len()).rev() {
                    if plan.old_to_new[old].is_none() {
                        state.remove_source(old, &mut changes);
                    }
                }

                // Kept items in their current order, by target index.
                let mut order: Vec<usize> = plan.old_to_new.iter().flatten().copied().collect();
                let mut settled = plan.stationary.clone();
                for target_index in 0..plan.new_to_old.len() {
                    if plan.new_to_old[target_index].is_none() || settled[target_index] {
                        continue;
                    }
                    let Some(from) = order.iter().position(|&t| t == target_index) else {
                        continue;
                    };
                    order.remove(from);
                    let to = order
                        .iter()
                        .position(|&t| settled[t] && t > target_index)
                        .unwrap_or(order.len());
                    order.insert(to, target_index);
                    settled[target_index] = true;
                    state.move_source(from, to, &mut changes);
                }

                for (position, slot) in incoming.iter_mut().enumerate() {
                    if plan.new_to_old[position].is_none() {
                        if let Some(item) = slot.take() {
                            state.insert_source(position, item, &mut changes);
                        }
                    }
                }
            }
            (incoming, plan)
        };

        tracing::debug!(
            target: targets::RECONCILE,
            removed = plan.removed(),
            inserted = plan.inserted(),
            moved = plan.moved(),
            matched = plan.matched(),
            "source reconciled"
        );
        self.shared.signals.emit_changes(coalesce(changes));
        incoming
    }

    fn apply_updates(&self, incoming: &[Option<T>], update: &mut UpdateFn<'_, T>) -> Result<()> {
        let mut updated = 0usize;
        for (position, fresh) in incoming.iter().enumerate() {
            let Some(fresh) = fresh else {
                continue;
            };
            let Some(mut kept) = self.shared.state.read().original.get(position).cloned() else {
                break;
            };

            if let Err(err) = update(&mut kept, fresh) {
                tracing::debug!(target: targets::RECONCILE, position, updated, "update callback failed");
                return Err(CollectionError::update(err));
            }

            let mut changes = Vec::new();
            {
                let mut state = self.shared.state.write();
                if position < state.original.len() {
                    state.replace_source(position, kept, &mut changes);
                }
            }
            self.shared.signals.emit_changes(changes);
            updated += 1;
        }
        tracing::trace!(target: targets::RECONCILE, updated, "matched items updated");
        Ok(())
    }
}

impl<T: CollectionItem> Drop for ManagedCollection<T> {
    fn drop(&mut self) {
        self.shared.disconnect_search_filter();
    }
}

impl<T: CollectionItem + std::fmt::Debug> std::fmt::Debug for ManagedCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("ManagedCollection")
            .field("original", &state.original)
            .field("view", &state.view)
            .field("changing", &self.shared.changing.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Keeps a change batch open for its lifetime.
///
/// Created by [`ManagedCollection::begin_changes`].
pub struct ChangeGuard<'a, T: CollectionItem> {
    collection: &'a ManagedCollection<T>,
}

impl<T: CollectionItem> Drop for ChangeGuard<'_, T> {
    fn drop(&mut self) {
        self.collection.shared.end_changing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparer::{FnComparer, KeyComparer};
    use crate::filter::{FnFilter, TextSearchFilter};

    fn recorder<T: CollectionItem>(
        collection: &ManagedCollection<T>,
    ) -> Arc<Mutex<Vec<CollectionChange<T>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        collection
            .signals()
            .collection_changed
            .connect(move |change| sink.lock().push(change.clone()));
        events
    }

    fn ordinal() -> Arc<dyn ItemComparer<String>> {
        Arc::new(FnComparer::new(|a: &String, b: &String| a.cmp(b)))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_and_remove() {
        let collection = ManagedCollection::new();
        let events = recorder(&collection);

        collection.add("A".to_string());
        collection.add("B".to_string());
        assert_eq!(collection.original_items(), strings(&["A", "B"]));
        assert_eq!(collection.to_vec(), strings(&["A", "B"]));

        assert!(collection.remove(&"A".to_string()));
        assert!(!collection.remove(&"Z".to_string()));
        assert_eq!(collection.to_vec(), strings(&["B"]));
        assert_eq!(events.lock().len(), 3);
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let collection = ManagedCollection::new();
        collection.add(1);
        let err = collection.remove_at(3).unwrap_err();
        assert!(matches!(err, CollectionError::IndexOutOfRange { index: 3, len: 1 }));
        assert_eq!(collection.remove_at(0).unwrap(), 1);
        assert!(collection.is_empty());
    }

    #[test]
    fn test_add_range_coalesces() {
        let collection = ManagedCollection::new();
        let events = recorder(&collection);

        collection.add_range(1..=4);
        assert_eq!(
            *events.lock(),
            vec![CollectionChange::Add { index: 0, items: vec![1, 2, 3, 4] }]
        );
    }

    #[test]
    fn test_sorted_insert() {
        let collection = ManagedCollection::new();
        collection.set_comparer(ordinal());
        collection.add_range(strings(&["m", "a", "z"]));
        collection.insert(0, "b".to_string());

        assert_eq!(collection.original_items(), strings(&["b", "m", "a", "z"]));
        assert_eq!(collection.to_vec(), strings(&["a", "b", "m", "z"]));
        assert_eq!(collection.index_of(&"m".to_string()), Some(2));
    }

    #[test]
    fn test_filter_change_resets() {
        let collection = ManagedCollection::new();
        collection.add_range(1..=6);
        let events = recorder(&collection);

        collection.set_filter(Arc::new(FnFilter::new(|n: &i32| n % 2 == 0)));
        assert_eq!(collection.to_vec(), vec![2, 4, 6]);
        assert!(events.lock()[0].is_reset());

        collection.clear_filter();
        assert_eq!(collection.len(), 6);
    }

    #[test]
    fn test_search_filter_rebuilds_on_change() {
        let collection = ManagedCollection::new();
        collection.add_range(strings(&["alice", "bob", "carol"]));

        let search = Arc::new(TextSearchFilter::new(|s: &String, text: &str| s.contains(text)));
        collection.set_search_filter(search.clone());
        assert_eq!(collection.len(), 3);

        search.set_search_text("o");
        assert_eq!(collection.to_vec(), strings(&["bob", "carol"]));

        collection.clear_search_filter();
        search.set_search_text("alice");
        assert_eq!(collection.len(), 3);
        assert_eq!(search.changed().connection_count(), 0);
    }

    #[test]
    fn test_replacing_search_filter_disconnects_previous() {
        let collection = ManagedCollection::new();
        collection.add_range(strings(&["alice", "bob"]));

        let old = Arc::new(TextSearchFilter::new(|s: &String, text: &str| s.contains(text)));
        let new = Arc::new(TextSearchFilter::new(|s: &String, text: &str| s.starts_with(text)));
        collection.set_search_filter(old.clone());
        collection.set_search_filter(new.clone());
        assert_eq!(old.changed().connection_count(), 0);
        assert_eq!(new.changed().connection_count(), 1);

        let events = recorder(&collection);
        old.set_search_text("bob");
        assert!(events.lock().is_empty());
        assert_eq!(collection.len(), 2);

        new.set_search_text("a");
        assert_eq!(collection.to_vec(), strings(&["alice"]));
    }

    #[test]
    fn test_dropping_collection_disconnects_search_filter() {
        let search = Arc::new(TextSearchFilter::new(|s: &String, text: &str| s.contains(text)));
        {
            let collection = ManagedCollection::<String>::new();
            collection.set_search_filter(search.clone());
            assert_eq!(search.changed().connection_count(), 1);
        }
        assert_eq!(search.changed().connection_count(), 0);
    }

    #[test]
    fn test_change_batch_nesting() {
        let collection = ManagedCollection::<i32>::new();
        let props = Arc::new(Mutex::new(Vec::new()));
        let sink = props.clone();
        collection
            .signals()
            .property_changed
            .connect(move |p| sink.lock().push(*p));

        collection.start_changing();
        collection.start_changing();
        assert!(collection.is_changing());
        collection.end_changing();
        assert!(collection.is_changing());
        collection.end_changing();
        assert!(!collection.is_changing());
        collection.end_changing();
        assert!(!collection.is_changing());

        assert_eq!(
            *props.lock(),
            vec![CollectionProperty::IsChanging, CollectionProperty::IsChanging]
        );
    }

    #[test]
    fn test_change_guard() {
        let collection = ManagedCollection::<i32>::new();
        {
            let _guard = collection.begin_changes();
            assert!(collection.is_changing());
        }
        assert!(!collection.is_changing());
    }

    #[test]
    fn test_sorting_variants() {
        let collection = ManagedCollection::new();
        collection.add_range(strings(&["bb", "a", "ccc"]));

        collection.set_sorting_variants(vec![
            SortingVariant::new("Name", FnComparer::new(|a: &String, b: &String| a.cmp(b))),
            SortingVariant::new("Length", KeyComparer::new(|s: &String| std::cmp::Reverse(s.len()))),
        ]);
        assert_eq!(collection.selected_sorting_index(), Some(0));
        assert_eq!(collection.to_vec(), strings(&["a", "bb", "ccc"]));

        assert!(collection.set_selected_sorting_index(1));
        assert_eq!(collection.to_vec(), strings(&["ccc", "bb", "a"]));

        let props = Arc::new(Mutex::new(Vec::new()));
        let sink = props.clone();
        collection
            .signals()
            .property_changed
            .connect(move |p| sink.lock().push(*p));
        let events = recorder(&collection);

        assert!(!collection.set_selected_sorting_index(1));
        assert!(!collection.set_selected_sorting_index(5));
        assert_eq!(collection.selected_sorting_index(), Some(1));
        assert!(props.lock().is_empty());
        assert!(events.lock().is_empty());

        collection.set_sorting_variants(Vec::new());
        assert_eq!(collection.selected_sorting_index(), None);
        assert_eq!(collection.to_vec(), strings(&["ccc", "bb", "a"]));
    }

    #[test]
    fn test_modify_repositions() {
        let collection = ManagedCollection::new();
        collection.set_comparer(ordinal());
        collection.add_range(strings(&["a", "b", "c"]));
        let events = recorder(&collection);

        let len = collection.modify(0, |s| {
            *s = "d".to_string();
            s.len()
        });
        assert_eq!(len.unwrap(), 1);
        assert_eq!(collection.to_vec(), strings(&["b", "c", "d"]));
        assert_eq!(
            *events.lock(),
            vec![
                CollectionChange::Move { from: 0, to: 2, item: "d".to_string() },
                CollectionChange::Replace { index: 2, old: "a".to_string(), new: "d".to_string() },
            ]
        );

        assert!(collection.modify(9, |_| ()).is_err());
    }

    #[test]
    fn test_move_item() {
        let collection = ManagedCollection::new();
        collection.add_range(['a', 'b', 'c']);
        collection.move_item(2, 0).unwrap();
        assert_eq!(collection.to_vec(), vec!['c', 'a', 'b']);
        assert!(collection.move_item(0, 3).is_err());
    }

    #[test]
    fn test_reconcile_moves_instead_of_resetting() {
        let collection = ManagedCollection::new();
        collection.add_range(strings(&["A", "B", "C"]));
        let events = recorder(&collection);

        collection.reconcile_original_items(strings(&["B", "C", "A"]));
        assert_eq!(collection.to_vec(), strings(&["B", "C", "A"]));
        assert_eq!(
            *events.lock(),
            vec![CollectionChange::Move { from: 0, to: 2, item: "A".to_string() }]
        );
    }

    #[test]
    fn test_reconcile_update_error_restores_batch() {
        let collection = ManagedCollection::new();
        collection.add_range(strings(&["A", "B"]));

        let result = collection.try_reconcile_original_items(strings(&["A", "B"]), |_, _| {
            Err::<(), _>("storage unavailable")
        });
        assert!(matches!(result, Err(CollectionError::Update(_))));
        assert!(!collection.is_changing());
    }
}
