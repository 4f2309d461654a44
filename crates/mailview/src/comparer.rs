//! Ordering and identity policies for collection items.
//!
//! An [`ItemComparer`] plays two roles in a managed collection: it defines
//! the sort order of the view, and it decides whether an item freshly loaded
//! from storage is "the same" logical entity as one already held (so that
//! reconciliation keeps the old instance instead of replacing it).

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// A total order over `T` plus the matching equality derived from it.
///
/// Implementations must keep `equals` consistent with `item_hash`: two items
/// that are `equals` must return the same hash (or both `None`).
pub trait ItemComparer<T>: Send + Sync {
    /// Compares two items for sorting.
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// Returns `true` if both items denote the same logical entity.
    fn equals(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Optional hash of the matching key, used to bucket candidates during
    /// reconciliation. `None` falls back to pairwise comparison.
    fn item_hash(&self, _item: &T) -> Option<u64> {
        None
    }
}

/// A comparer backed by an ordering closure.
///
/// ```
/// use mailview::{FnComparer, ItemComparer};
///
/// let by_len = FnComparer::new(|a: &String, b: &String| a.len().cmp(&b.len()));
/// assert!(by_len.equals(&"ab".to_string(), &"cd".to_string()));
/// ```
pub struct FnComparer<F> {
    compare: F,
}

impl<F> FnComparer<F> {
    /// Creates a comparer from an ordering closure.
    pub fn new(compare: F) -> Self {
        Self { compare }
    }
}

impl<T, F> ItemComparer<T> for FnComparer<F>
where
    F: Fn(&T, &T) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }
}

/// Orders and matches items by an extracted key.
///
/// This is the usual identity policy for records loaded from storage: two
/// contacts are the same contact when their ids match, whatever their other
/// fields say.
///
/// ```
/// use mailview::{ItemComparer, KeyComparer};
///
/// #[derive(Clone)]
/// struct Contact { id: u32, name: String }
///
/// let by_id = KeyComparer::new(|c: &Contact| c.id);
/// let old = Contact { id: 7, name: "Ann".into() };
/// let reloaded = Contact { id: 7, name: "Ann Smith".into() };
/// assert!(by_id.equals(&old, &reloaded));
/// ```
pub struct KeyComparer<F, K> {
    key: F,
    _key: PhantomData<fn() -> K>,
}

impl<F, K> KeyComparer<F, K> {
    /// Creates a comparer from a key extractor.
    pub fn new(key: F) -> Self {
        Self {
            key,
            _key: PhantomData,
        }
    }
}

impl<T, F, K> ItemComparer<T> for KeyComparer<F, K>
where
    F: Fn(&T) -> K + Send + Sync,
    K: Ord + Hash,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.key)(a).cmp(&(self.key)(b))
    }

    fn item_hash(&self, item: &T) -> Option<u64> {
        let mut hasher = DefaultHasher::new();
        (self.key)(item).hash(&mut hasher);
        Some(hasher.finish())
    }
}

/// Inverts the ordering of another comparer while keeping its equality.
pub struct ReverseComparer<T> {
    inner: Arc<dyn ItemComparer<T>>,
}

impl<T> ReverseComparer<T> {
    /// Wraps a comparer, reversing its sort order.
    pub fn new(inner: Arc<dyn ItemComparer<T>>) -> Self {
        Self { inner }
    }
}

impl<T> ItemComparer<T> for ReverseComparer<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.inner.compare(a, b).reverse()
    }

    fn equals(&self, a: &T, b: &T) -> bool {
        self.inner.equals(a, b)
    }

    fn item_hash(&self, item: &T) -> Option<u64> {
        self.inner.item_hash(item)
    }
}

/// A named comparer offered to the user as a sort option.
pub struct SortingVariant<T> {
    /// Display name, e.g. "Name" or "Newest first".
    pub name: String,
    /// The comparer applied when this variant is selected.
    pub comparer: Arc<dyn ItemComparer<T>>,
}

impl<T> SortingVariant<T> {
    /// Creates a sorting variant.
    pub fn new(name: impl Into<String>, comparer: impl ItemComparer<T> + 'static) -> Self {
        Self {
            name: name.into(),
            comparer: Arc::new(comparer),
        }
    }
}

impl<T> Clone for SortingVariant<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            comparer: self.comparer.clone(),
        }
    }
}

impl<T> fmt::Debug for SortingVariant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortingVariant")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
