//! Item filters.
//!
//! Two kinds of filter restrict which items of a collection are visible:
//!
//! - [`ItemFilter`]: a plain predicate, re-applied whenever it is replaced.
//! - [`SearchFilter`]: a predicate with mutable state of its own (typically a
//!   search box text) that announces state changes through a signal, so the
//!   collection can re-evaluate its view immediately.

use std::fmt;

use mailview_core::{Property, Signal};

/// A predicate deciding whether an item is visible.
///
/// Filters used with nullable item types (`Option<_>`) must not panic on
/// `None`; excluding such items is the usual choice.
pub trait ItemFilter<T>: Send + Sync {
    /// Returns `true` if the item should be part of the view.
    fn item_passed_filter(&self, item: &T) -> bool;
}

/// A filter backed by a closure.
///
/// ```
/// use mailview::{FnFilter, ItemFilter};
///
/// let short = FnFilter::new(|s: &String| s.len() <= 2);
/// assert!(short.item_passed_filter(&"ab".to_string()));
/// assert!(!short.item_passed_filter(&"abc".to_string()));
/// ```
pub struct FnFilter<F> {
    predicate: F,
}

impl<F> FnFilter<F> {
    /// Creates a filter from a predicate.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<T, F> ItemFilter<T> for FnFilter<F>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn item_passed_filter(&self, item: &T) -> bool {
        (self.predicate)(item)
    }
}

/// A filter whose outcome depends on state that changes over time.
///
/// Any emission of [`changed`](Self::changed) is treated by the collection as
/// "the predicate may have changed" and triggers a full re-evaluation.
pub trait SearchFilter<T>: ItemFilter<T> {
    /// Signal emitted whenever the filter's state changes.
    fn changed(&self) -> &Signal<()>;
}

type Matcher<T> = Box<dyn Fn(&T, &str) -> bool + Send + Sync>;

/// A search filter driven by a live search text.
///
/// An empty search text lets every item through without consulting the
/// matcher.
///
/// ```
/// use mailview::{ItemFilter, TextSearchFilter};
///
/// let filter = TextSearchFilter::new(|name: &String, text: &str| {
///     name.to_lowercase().contains(&text.to_lowercase())
/// });
/// assert!(filter.item_passed_filter(&"Alice".to_string()));
///
/// filter.set_search_text("bo");
/// assert!(!filter.item_passed_filter(&"Alice".to_string()));
/// assert!(filter.item_passed_filter(&"Bob".to_string()));
/// ```
pub struct TextSearchFilter<T> {
    search_text: Property<String>,
    matcher: Matcher<T>,
    changed: Signal<()>,
}

impl<T> TextSearchFilter<T> {
    /// Creates a search filter with an empty search text.
    pub fn new<F>(matcher: F) -> Self
    where
        F: Fn(&T, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            search_text: Property::new(String::new()),
            matcher: Box::new(matcher),
            changed: Signal::new(),
        }
    }

    /// Returns the current search text.
    pub fn search_text(&self) -> String {
        self.search_text.get()
    }

    /// Sets the search text, emitting `changed` if it differs from the
    /// current one. Returns whether it changed.
    pub fn set_search_text(&self, text: impl Into<String>) -> bool {
        let changed = self.search_text.set(text.into());
        if changed {
            self.changed.emit(());
        }
        changed
    }

    /// Forces a re-evaluation, for matchers that read other external state.
    pub fn notify_changed(&self) {
        self.changed.emit(());
    }
}

impl<T> ItemFilter<T> for TextSearchFilter<T> {
    fn item_passed_filter(&self, item: &T) -> bool {
        self.search_text
            .with(|text| text.is_empty() || (self.matcher)(item, text))
    }
}

impl<T> SearchFilter<T> for TextSearchFilter<T> {
    fn changed(&self) -> &Signal<()> {
        &self.changed
    }
}

impl<T> fmt::Debug for TextSearchFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextSearchFilter")
            .field("search_text", &self.search_text.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_fn_filter() {
        let even = FnFilter::new(|n: &i32| n % 2 == 0);
        assert!(even.item_passed_filter(&4));
        assert!(!even.item_passed_filter(&3));
    }

    #[test]
    fn test_search_text_change_emits_once() {
        let filter = TextSearchFilter::new(|s: &String, text: &str| s.contains(text));
        let count = Arc::new(Mutex::new(0));

        let count_clone = count.clone();
        filter.changed().connect(move |_| *count_clone.lock() += 1);

        assert!(filter.set_search_text("ali"));
        assert!(!filter.set_search_text("ali"));
        assert_eq!(*count.lock(), 1);
        assert_eq!(filter.search_text(), "ali");

        filter.notify_changed();
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_empty_text_passes_everything() {
        let filter = TextSearchFilter::new(|_: &String, _: &str| false);
        assert!(filter.item_passed_filter(&"anything".to_string()));
        filter.set_search_text("x");
        assert!(!filter.item_passed_filter(&"anything".to_string()));
    }

    #[test]
    fn test_nullable_items_are_excluded() {
        let filter = TextSearchFilter::new(|item: &Option<String>, text: &str| {
            item.as_deref().is_some_and(|s| s.contains(text))
        });
        filter.set_search_text("a");
        assert!(!filter.item_passed_filter(&None));
        assert!(filter.item_passed_filter(&Some("mail".to_string())));
    }
}
