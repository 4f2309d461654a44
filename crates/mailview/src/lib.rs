//! Observable collections for list-based views.
//!
//! `mailview` keeps a source list of items together with a filtered, sorted
//! projection of it and reports every change to that projection as
//! fine-grained events. Views (message lists, contact lists, folder pickers)
//! bind to the projection and to the events; view-models feed the source
//! list, typically by reconciling it against a freshly loaded snapshot.
//!
//! # Overview
//!
//! - [`ManagedCollection`]: the source list plus its view
//! - [`ItemFilter`] / [`SearchFilter`]: visibility predicates, the latter
//!   observable (see [`TextSearchFilter`])
//! - [`ItemComparer`]: sort order and item identity (see [`KeyComparer`])
//! - [`CollectionChange`] / [`CollectionProperty`]: what observers receive
//!
//! # Reconciliation
//!
//! ```
//! use std::sync::Arc;
//! use mailview::{KeyComparer, ManagedCollection};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Contact {
//!     id: u32,
//!     name: String,
//! }
//!
//! let contacts = ManagedCollection::<Contact>::new();
//! contacts.set_comparer(Arc::new(KeyComparer::new(|c: &Contact| c.id)));
//! contacts.add(Contact { id: 1, name: "Ann".into() });
//!
//! // A reload brings a renamed contact and a new one.
//! contacts.reconcile_original_items_with(
//!     [
//!         Contact { id: 1, name: "Ann Smith".into() },
//!         Contact { id: 2, name: "Bo".into() },
//!     ],
//!     |kept, fresh| kept.name = fresh.name.clone(),
//! );
//!
//! let names: Vec<String> = contacts.iter().map(|c| c.name).collect();
//! assert_eq!(names, ["Ann Smith", "Bo"]);
//! ```

pub mod collection;
pub mod comparer;
pub mod error;
pub mod filter;
pub mod notify;

pub use collection::{ChangeGuard, CollectionItem, ManagedCollection, ManagedCollectionBuilder};
pub use comparer::{FnComparer, ItemComparer, KeyComparer, ReverseComparer, SortingVariant};
pub use error::{BoxError, CollectionError, Result};
pub use filter::{FnFilter, ItemFilter, SearchFilter, TextSearchFilter};
pub use notify::{CollectionChange, CollectionProperty, CollectionSignals};

pub use mailview_core::{ConnectionId, Signal};
