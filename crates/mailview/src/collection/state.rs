//! Source list and view mapping.
//!
//! The view is stored as a list of source indices (proxy row to source row),
//! ordered by the active comparer with the source index as tie-break. With
//! no comparer this is plain source order. Every primitive below keeps that
//! invariant and records the view events it caused.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::comparer::ItemComparer;
use crate::filter::{ItemFilter, SearchFilter};
use crate::notify::CollectionChange;

pub(crate) struct CollectionState<T> {
    pub(crate) original: Vec<T>,
    /// Mapping from view index to source index.
    pub(crate) view: Vec<usize>,
    pub(crate) filter: Option<Arc<dyn ItemFilter<T>>>,
    pub(crate) search_filter: Option<Arc<dyn SearchFilter<T>>>,
    pub(crate) comparer: Option<Arc<dyn ItemComparer<T>>>,
}

impl<T: Clone + PartialEq> CollectionState<T> {
    pub(crate) fn new() -> Self {
        Self {
            original: Vec::new(),
            view: Vec::new(),
            filter: None,
            search_filter: None,
            comparer: None,
        }
    }

    pub(crate) fn view_item(&self, view_index: usize) -> Option<&T> {
        self.view.get(view_index).map(|&source| &self.original[source])
    }

    pub(crate) fn view_items(&self) -> impl Iterator<Item = &T> {
        self.view.iter().map(|&source| &self.original[source])
    }

    /// Both filters must pass.
    pub(crate) fn passes(&self, item: &T) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.item_passed_filter(item))
            && self
                .search_filter
                .as_ref()
                .is_none_or(|filter| filter.item_passed_filter(item))
    }

    fn view_order(&self, a: usize, b: usize) -> Ordering {
        match &self.comparer {
            Some(comparer) => comparer
                .compare(&self.original[a], &self.original[b])
                .then(a.cmp(&b)),
            None => a.cmp(&b),
        }
    }

    /// View index at which `source` belongs. `source` must not be in the view.
    ///
    /// Entries listed in `pending` are about to be refiltered and may sit at
    /// stale positions, so they are skipped.
    fn view_position_for(&self, source: usize, pending: &[usize]) -> usize {
        if pending.is_empty() {
            return self
                .view
                .partition_point(|&other| self.view_order(other, source) == Ordering::Less);
        }

        self.view
            .iter()
            .rposition(|other| {
                !pending.contains(other) && self.view_order(*other, source) == Ordering::Less
            })
            .map_or(0, |last_before| last_before + 1)
    }

    pub(crate) fn view_index_of_source(&self, source: usize) -> Option<usize> {
        self.view.iter().position(|&other| other == source)
    }

    /// Recomputes the whole view from the source list.
    pub(crate) fn rebuild(&mut self) {
        let mut view: Vec<usize> = (0..self.original.len())
            .filter(|&source| self.passes(&self.original[source]))
            .collect();
        view.sort_by(|&a, &b| self.view_order(a, b));
        self.view = view;
    }

    pub(crate) fn clear(&mut self) {
        self.original.clear();
        self.view.clear();
    }

    pub(crate) fn insert_source(
        &mut self,
        position: usize,
        item: T,
        out: &mut Vec<CollectionChange<T>>,
    ) {
        self.original.insert(position, item);
        for source in &mut self.view {
            if *source >= position {
                *source += 1;
            }
        }

        if self.passes(&self.original[position]) {
            let view_index = self.view_position_for(position, &[]);
            self.view.insert(view_index, position);
            out.push(CollectionChange::Add {
                index: view_index,
                items: vec![self.original[position].clone()],
            });
        }
    }

    pub(crate) fn remove_source(
        &mut self,
        position: usize,
        out: &mut Vec<CollectionChange<T>>,
    ) -> T {
        if let Some(view_index) = self.view_index_of_source(position) {
            self.view.remove(view_index);
            out.push(CollectionChange::Remove {
                index: view_index,
                items: vec![self.original[position].clone()],
            });
        }

        let item = self.original.remove(position);
        for source in &mut self.view {
            if *source > position {
                *source -= 1;
            }
        }
        item
    }

    /// Moves a source item; `to` is its index after the move.
    pub(crate) fn move_source(&mut self, from: usize, to: usize, out: &mut Vec<CollectionChange<T>>) {
        if from == to {
            return;
        }

        let old_view_index = self.view_index_of_source(from);

        let item = self.original.remove(from);
        self.original.insert(to, item);

        for source in &mut self.view {
            *source = if *source == from {
                to
            } else if from < to && *source > from && *source <= to {
                *source - 1
            } else if from > to && *source >= to && *source < from {
                *source + 1
            } else {
                *source
            };
        }

        if let Some(old_view_index) = old_view_index {
            self.view.remove(old_view_index);
            let new_view_index = self.view_position_for(to, &[]);
            self.view.insert(new_view_index, to);
            if new_view_index != old_view_index {
                out.push(CollectionChange::Move {
                    from: old_view_index,
                    to: new_view_index,
                    item: self.original[to].clone(),
                });
            }
        }
    }

    /// Stores a new value for a source item and refilters it.
    pub(crate) fn replace_source(
        &mut self,
        position: usize,
        item: T,
        out: &mut Vec<CollectionChange<T>>,
    ) {
        let previous = std::mem::replace(&mut self.original[position], item);
        self.refilter_source(position, Some(previous), &[], out);
    }

    /// Re-evaluates membership and position of one source item.
    ///
    /// `previous` is the value the view last showed, if it may differ from the
    /// current one; a `Replace` is recorded when it does.
    pub(crate) fn refilter_source(
        &mut self,
        position: usize,
        previous: Option<T>,
        pending: &[usize],
        out: &mut Vec<CollectionChange<T>>,
    ) {
        let was_visible = self.view_index_of_source(position);
        let passes = self.passes(&self.original[position]);

        match (was_visible, passes) {
            (Some(old_view_index), true) => {
                self.view.remove(old_view_index);
                let new_view_index = self.view_position_for(position, pending);
                self.view.insert(new_view_index, position);

                let current = &self.original[position];
                if new_view_index != old_view_index {
                    out.push(CollectionChange::Move {
                        from: old_view_index,
                        to: new_view_index,
                        item: current.clone(),
                    });
                }
                if let Some(previous) = previous.filter(|previous| previous != current) {
                    out.push(CollectionChange::Replace {
                        index: new_view_index,
                        old: previous,
                        new: current.clone(),
                    });
                }
            }
            (Some(old_view_index), false) => {
                self.view.remove(old_view_index);
                out.push(CollectionChange::Remove {
                    index: old_view_index,
                    items: vec![previous.unwrap_or_else(|| self.original[position].clone())],
                });
            }
            (None, true) => {
                let view_index = self.view_position_for(position, pending);
                self.view.insert(view_index, position);
                out.push(CollectionChange::Add {
                    index: view_index,
                    items: vec![self.original[position].clone()],
                });
            }
            (None, false) => {}
        }
    }
}
