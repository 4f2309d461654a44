//! Contact list example: a searchable, sortable list kept in sync with reloads.
//!
//! Run with: cargo run -p mailview --example contact_list
//! Set `RUST_LOG=mailview=trace` to see every collection operation.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use mailview::{
    CollectionChange, ItemComparer, KeyComparer, ManagedCollection, ReverseComparer,
    SortingVariant, TextSearchFilter,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
struct Contact {
    id: u32,
    name: String,
    email: String,
}

impl Contact {
    fn new(id: u32, name: &str, email: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

/// Alphabetical order; two records are the same contact when their ids match.
struct ByName;

impl ItemComparer<Contact> for ByName {
    fn compare(&self, a: &Contact, b: &Contact) -> Ordering {
        a.name.cmp(&b.name).then(a.id.cmp(&b.id))
    }

    fn equals(&self, a: &Contact, b: &Contact) -> bool {
        a.id == b.id
    }

    fn item_hash(&self, item: &Contact) -> Option<u64> {
        let mut hasher = DefaultHasher::new();
        item.id.hash(&mut hasher);
        Some(hasher.finish())
    }
}

fn print_view(title: &str, contacts: &ManagedCollection<Contact>) {
    println!("{title}");
    contacts.with_items(|items| {
        for contact in items {
            println!("  #{:<3} {:<16} {}", contact.id, contact.name, contact.email);
        }
    });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mailview=debug")),
        )
        .init();

    let search = Arc::new(TextSearchFilter::new(|contact: &Contact, text: &str| {
        let text = text.to_lowercase();
        contact.name.to_lowercase().contains(&text) || contact.email.to_lowercase().contains(&text)
    }));

    let newest_first: Arc<dyn ItemComparer<Contact>> =
        Arc::new(KeyComparer::new(|contact: &Contact| contact.id));
    let contacts = ManagedCollection::builder()
        .items([
            Contact::new(1, "Grace Hopper", "grace@navy.mil"),
            Contact::new(2, "Alan Turing", "alan@bletchley.uk"),
            Contact::new(3, "Ada Lovelace", "ada@engine.org"),
        ])
        .search_filter(search.clone())
        .sorting_variants(vec![
            SortingVariant::new("Name", ByName),
            SortingVariant::new("Newest first", ReverseComparer::new(newest_first)),
        ])
        .build();

    contacts.signals().collection_changed.connect(|change| match change {
        CollectionChange::Add { index, items } => println!("  + {} at {index}", items.len()),
        CollectionChange::Remove { index, items } => println!("  - {} at {index}", items.len()),
        CollectionChange::Move { from, to, item } => println!("  ~ {} {from} -> {to}", item.name),
        CollectionChange::Replace { index, new, .. } => println!("  * {} at {index}", new.name),
        CollectionChange::Reset => println!("  reset"),
    });

    print_view("Initial contacts:", &contacts);

    // A reload from the address book: Alan was renamed, Grace was deleted,
    // Edsger is new.
    println!("Reloading:");
    contacts.reconcile_original_items_with(
        [
            Contact::new(3, "Ada Lovelace", "ada@engine.org"),
            Contact::new(2, "Alan M. Turing", "alan@bletchley.uk"),
            Contact::new(4, "Edsger Dijkstra", "ewd@tue.nl"),
        ],
        |kept, fresh| kept.clone_from(fresh),
    );
    print_view("After reload:", &contacts);

    println!("Searching for \"tur\":");
    search.set_search_text("tur");
    print_view("Matching \"tur\":", &contacts);
    search.set_search_text("");

    println!("Sorting by newest first:");
    contacts.set_selected_sorting_index(1);
    print_view("Newest first:", &contacts);
}
