use std::sync::Arc;

use crate::comparer::{ItemComparer, SortingVariant};
use crate::filter::{ItemFilter, SearchFilter};

use super::{CollectionItem, ManagedCollection};

/// Builder pattern for creating managed collections.
///
/// The view is built once, after every setting is in place, so no change
/// notification is emitted during construction.
///
/// ```
/// use mailview::{FnFilter, KeyComparer, ManagedCollection};
///
/// let numbers = ManagedCollection::builder()
///     .items(vec![5, 3, 8, 1])
///     .filter(FnFilter::new(|n: &i32| *n > 2))
///     .comparer(KeyComparer::new(|n: &i32| *n))
///     .build();
///
/// assert_eq!(numbers.to_vec(), vec![3, 5, 8]);
/// ```
pub struct ManagedCollectionBuilder<T: CollectionItem> {
    items: Vec<T>,
    filter: Option<Arc<dyn ItemFilter<T>>>,
    search_filter: Option<Arc<dyn SearchFilter<T>>>,
    comparer: Option<Arc<dyn ItemComparer<T>>>,
    sorting_variants: Vec<SortingVariant<T>>,
    selected_sorting_index: Option<usize>,
}

impl<T: CollectionItem> Default for ManagedCollectionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CollectionItem> ManagedCollectionBuilder<T> {
    /// Creates a builder for an empty, unfiltered, unsorted collection.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            filter: None,
            search_filter: None,
            comparer: None,
            sorting_variants: Vec::new(),
            selected_sorting_index: None,
        }
    }

    /// Sets the initial source items.
    pub fn items(mut self, items: impl IntoIterator<Item = T>) -> Self {
        self.items = items.into_iter().collect();
        self
    }

    /// Sets the predicate filter.
    pub fn filter(mut self, filter: impl ItemFilter<T> + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the search filter. Keep a clone of the `Arc` to drive it.
    pub fn search_filter(mut self, filter: Arc<dyn SearchFilter<T>>) -> Self {
        self.search_filter = Some(filter);
        self
    }

    /// Sets the comparer.
    pub fn comparer(mut self, comparer: impl ItemComparer<T> + 'static) -> Self {
        self.comparer = Some(Arc::new(comparer));
        self
    }

    /// Sets the offered sorting variants.
    ///
    /// When non-empty, the selected variant's comparer replaces any comparer
    /// set with [`comparer`](Self::comparer).
    pub fn sorting_variants(mut self, variants: Vec<SortingVariant<T>>) -> Self {
        self.sorting_variants = variants;
        self
    }

    /// Selects the initial sorting variant. Out of range falls back to the
    /// first variant.
    pub fn selected_sorting_index(mut self, index: usize) -> Self {
        self.selected_sorting_index = Some(index);
        self
    }

    /// Builds the collection.
    pub fn build(self) -> Arc<ManagedCollection<T>> {
        let collection = ManagedCollection::new();
        let shared = &collection.shared;

        let selected = if self.sorting_variants.is_empty() {
            None
        } else {
            self.selected_sorting_index
                .filter(|&index| index < self.sorting_variants.len())
                .or(Some(0))
        };
        let comparer = match selected {
            Some(index) => Some(self.sorting_variants[index].comparer.clone()),
            None => self.comparer,
        };

        if let Some(filter) = &self.search_filter {
            shared.connect_search_filter(filter);
        }

        {
            let mut state = shared.state.write();
            state.original = self.items;
            state.filter = self.filter;
            state.search_filter = self.search_filter;
            state.comparer = comparer;
            state.rebuild();
        }
        *shared.sorting_variants.write() = self.sorting_variants;
        shared.selected_sorting_index.set_silent(selected);

        tracing::debug!(
            target: mailview_core::logging::targets::COLLECTION,
            original = collection.original_len(),
            visible = collection.len(),
            "collection built"
        );
        Arc::new(collection)
    }
}
