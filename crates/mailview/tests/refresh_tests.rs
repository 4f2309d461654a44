//! In-place item changes: `refilter_item(s)` and async `refresh`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use mailview::{
    CollectionChange, CollectionProperty, FnComparer, FnFilter, ManagedCollection,
};
use parking_lot::Mutex;

/// A message whose flags change without the collection noticing.
#[derive(Debug)]
struct Message {
    id: u32,
    rank: AtomicU32,
    archived: AtomicBool,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

fn message(id: u32) -> Arc<Message> {
    Arc::new(Message {
        id,
        rank: AtomicU32::new(id),
        archived: AtomicBool::new(false),
    })
}

fn ids(collection: &ManagedCollection<Arc<Message>>) -> Vec<u32> {
    collection.iter().map(|m| m.id).collect()
}

fn inbox(messages: &[Arc<Message>]) -> ManagedCollection<Arc<Message>> {
    let collection = ManagedCollection::<Arc<Message>>::new();
    collection.set_filter(Arc::new(FnFilter::new(|m: &Arc<Message>| {
        !m.archived.load(Ordering::SeqCst)
    })));
    collection.set_comparer(Arc::new(FnComparer::new(|a: &Arc<Message>, b: &Arc<Message>| {
        a.rank.load(Ordering::SeqCst).cmp(&b.rank.load(Ordering::SeqCst))
    })));
    collection.add_range(messages.iter().cloned());
    collection
}

#[tokio::test]
async fn test_refresh_picks_up_in_place_changes() {
    let messages: Vec<_> = (1..=3).map(message).collect();
    let collection = inbox(&messages);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    collection
        .signals()
        .collection_changed
        .connect(move |change| sink.lock().push(change.is_reset()));
    let counted = Arc::new(Mutex::new(0));
    let counter = counted.clone();
    collection.signals().property_changed.connect(move |property| {
        if *property == CollectionProperty::Count {
            *counter.lock() += 1;
        }
    });

    messages[1].archived.store(true, Ordering::SeqCst);
    assert_eq!(ids(&collection), vec![1, 2, 3]);

    collection.refresh().await;

    assert_eq!(ids(&collection), vec![1, 3]);
    assert_eq!(*events.lock(), vec![true]);
    assert_eq!(*counted.lock(), 1);
}

#[test]
fn test_refilter_item_moves_between_view_and_source() {
    let messages: Vec<_> = (1..=3).map(message).collect();
    let collection = inbox(&messages);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    collection
        .signals()
        .collection_changed
        .connect(move |change: &CollectionChange<Arc<Message>>| sink.lock().push(change.clone()));

    messages[0].archived.store(true, Ordering::SeqCst);
    collection.refilter_item(&messages[0]);
    assert_eq!(ids(&collection), vec![2, 3]);

    messages[0].archived.store(false, Ordering::SeqCst);
    messages[0].rank.store(10, Ordering::SeqCst);
    collection.refilter_item(&messages[0]);
    assert_eq!(ids(&collection), vec![2, 3, 1]);

    let events = events.lock();
    assert!(matches!(events[0], CollectionChange::Remove { index: 0, .. }));
    assert!(matches!(events[1], CollectionChange::Add { index: 2, .. }));
    assert_eq!(events.len(), 2);
}

#[test]
fn test_refilter_items_handles_several_changes_at_once() {
    let messages: Vec<_> = (1..=4).map(message).collect();
    let collection = inbox(&messages);

    // Swap the ends and hide the second message in one go.
    messages[0].rank.store(9, Ordering::SeqCst);
    messages[3].rank.store(0, Ordering::SeqCst);
    messages[1].archived.store(true, Ordering::SeqCst);
    collection.refilter_items(&messages);

    assert_eq!(ids(&collection), vec![4, 3, 1]);
    assert_eq!(collection.original_len(), 4);
}

#[test]
fn test_refilter_of_unknown_item_is_ignored() {
    let messages: Vec<_> = (1..=2).map(message).collect();
    let collection = inbox(&messages);
    collection.refilter_item(&message(99));
    assert_eq!(ids(&collection), vec![1, 2]);
}
