//! Tests for Collection
//!
//! These tests verify:
//! - CRUD over typed entities
//! - Sequence id assignment and seeding from existing keys
//! - Key namespacing (no leakage between collections)
//! - Descriptions built by hand and from the Entity trait
//! - Deferred (Call) variants

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use stashkv::collection::{entity_key, Collection};
use stashkv::config::{Config, SyncStrategy};
use stashkv::converter::{BincodeConverter, JsonConverter};
use stashkv::description::{Description, Entity};
use stashkv::record::Record;
use stashkv::storage::{FileStorage, MemoryStorage, Storage};
use stashkv::StashError;
use tempfile::TempDir;

// =============================================================================
// Helper Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Book {
    id: u64,
    title: String,
}

impl Entity for Book {
    const COLLECTION: &'static str = "Book";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    key: u64,
    text: String,
}

fn book(title: &str) -> Book {
    Book {
        id: 0,
        title: title.to_string(),
    }
}

fn memory_storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new())
}

fn books(storage: Arc<dyn Storage>) -> Collection<Book> {
    Collection::new(Description::of().unwrap(), JsonConverter, storage).unwrap()
}

fn note_description() -> Description<Note> {
    Description::builder("Note")
        .id_getter(|n: &Note| n.key)
        .id_setter(|n: &mut Note, id| n.key = id)
        .build()
        .unwrap()
}

fn sorted_ids(items: &[Book]) -> Vec<u64> {
    let mut ids: Vec<u64> = items.iter().map(|b| b.id).collect();
    ids.sort_unstable();
    ids
}

// =============================================================================
// CRUD Tests
// =============================================================================

#[test]
fn test_put_assigns_id_and_get_returns_entity() {
    let books = books(memory_storage());

    let stored = books.put(book("Dune")).unwrap();

    assert_eq!(stored.id, 1);
    assert_eq!(books.get(1).unwrap(), Some(stored));
}

#[test]
fn test_get_missing_id() {
    let books = books(memory_storage());

    assert_eq!(books.get(42).unwrap(), None);
}

#[test]
fn test_put_with_explicit_id_replaces() {
    let books = books(memory_storage());
    books.put(book("Dune")).unwrap();

    books
        .put(Book {
            id: 1,
            title: "Dune Messiah".to_string(),
        })
        .unwrap();

    assert_eq!(books.count().unwrap(), 1);
    assert_eq!(books.get(1).unwrap().unwrap().title, "Dune Messiah");
}

#[test]
fn test_delete_returns_entity() {
    let books = books(memory_storage());
    let stored = books.put(book("Dune")).unwrap();

    assert_eq!(books.delete(stored.id).unwrap(), Some(stored));
    assert_eq!(books.delete(1).unwrap(), None);
    assert_eq!(books.get(1).unwrap(), None);
}

#[test]
fn test_put_all_all_and_count() {
    let books = books(memory_storage());

    let stored = books
        .put_all(vec![book("A"), book("B"), book("C")])
        .unwrap();

    assert_eq!(sorted_ids(&stored), vec![1, 2, 3]);
    assert_eq!(sorted_ids(&books.all().unwrap()), vec![1, 2, 3]);
    assert_eq!(books.count().unwrap(), 3);
}

#[test]
fn test_filter() {
    let books = books(memory_storage());
    books
        .put_all(vec![book("Dune"), book("Emma"), book("Dracula")])
        .unwrap();

    let d_books = books.filter(|b| b.title.starts_with('D')).unwrap();

    let titles: HashSet<String> = d_books.into_iter().map(|b| b.title).collect();
    assert_eq!(
        titles,
        HashSet::from(["Dune".to_string(), "Dracula".to_string()])
    );
}

#[test]
fn test_clear() {
    let books = books(memory_storage());
    books.put_all(vec![book("A"), book("B")]).unwrap();

    assert!(books.clear().unwrap());
    assert_eq!(books.count().unwrap(), 0);
    assert!(books.all().unwrap().is_empty());
}

#[test]
fn test_delete_middle_then_next_id() {
    let books = books(memory_storage());
    books
        .put_all(vec![book("one"), book("two"), book("three")])
        .unwrap();

    books.delete(2).unwrap();

    assert_eq!(sorted_ids(&books.all().unwrap()), vec![1, 3]);
    assert_eq!(books.put(book("four")).unwrap().id, 4);
}

// =============================================================================
// Sequence Tests
// =============================================================================

#[test]
fn test_explicit_id_raises_sequence() {
    let books = books(memory_storage());

    books
        .put(Book {
            id: 10,
            title: "ten".to_string(),
        })
        .unwrap();

    assert_eq!(books.last_sequence_id(), 10);
    assert_eq!(books.put(book("next")).unwrap().id, 11);
}

#[test]
fn test_exhausted_sequence_is_config_error() {
    let books = books(memory_storage());
    books
        .put(Book {
            id: u64::MAX,
            title: "last".to_string(),
        })
        .unwrap();

    let err = books.put(book("next")).unwrap_err();

    assert!(matches!(err, StashError::Config(_)));
    assert_eq!(books.last_sequence_id(), u64::MAX);
    assert_eq!(books.count().unwrap(), 1);

    // Explicit ids still work
    assert_eq!(
        books
            .put(Book {
                id: 5,
                title: "five".to_string(),
            })
            .unwrap()
            .id,
        5
    );
}

#[test]
fn test_sequence_seeded_from_existing_keys() {
    let storage = memory_storage();
    {
        let books = books(Arc::clone(&storage));
        books.put_all(vec![book("A"), book("B"), book("C")]).unwrap();
        books.delete(1).unwrap();
    }

    let books = books(storage);

    assert_eq!(books.last_sequence_id(), 3);
    assert_eq!(books.put(book("D")).unwrap().id, 4);
}

#[test]
fn test_sequence_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("books.db"))
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();

    let assigned: Vec<u64> = {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&config).unwrap());
        let books = books(storage);
        books
            .put_all((0..5).map(|i| book(&format!("book {}", i))))
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect()
    };

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&config).unwrap());
    let books = books(storage);

    let next = books.put(book("after restart")).unwrap().id;
    assert!(assigned.iter().all(|id| next > *id));
    assert_eq!(books.count().unwrap(), 6);
}

#[test]
fn test_non_numeric_keys_are_skipped_when_seeding() {
    let storage = memory_storage();
    storage
        .put(Record::new("Book:7", r#"{"id":7,"title":"seven"}"#))
        .unwrap();
    storage
        .put(Record::new("Book:draft", r#"{"id":0,"title":"draft"}"#))
        .unwrap();

    let books = books(storage);

    assert_eq!(books.last_sequence_id(), 7);
    assert_eq!(books.put(book("eight")).unwrap().id, 8);
}

#[test]
fn test_concurrent_puts_get_distinct_ids() {
    let books = books(memory_storage());
    let mut handles = Vec::new();

    for t in 0..4 {
        let books = books.clone();
        handles.push(thread::spawn(move || {
            (0..25)
                .map(|i| books.put(book(&format!("{}-{}", t, i))).unwrap().id)
                .collect::<Vec<u64>>()
        }));
    }

    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=100).collect::<Vec<u64>>());
    assert_eq!(books.count().unwrap(), 100);
}

// =============================================================================
// Namespacing Tests
// =============================================================================

#[test]
fn test_collections_do_not_leak_into_each_other() {
    let storage = memory_storage();
    let books = books(Arc::clone(&storage));
    let notes = Collection::new(note_description(), JsonConverter, Arc::clone(&storage)).unwrap();

    books.put(book("Dune")).unwrap();
    notes
        .put(Note {
            key: 0,
            text: "remember".to_string(),
        })
        .unwrap();

    assert_eq!(books.count().unwrap(), 1);
    assert_eq!(notes.count().unwrap(), 1);
    assert!(storage.get(&entity_key("Book", 1)).unwrap().is_some());
    assert!(storage.get(&entity_key("Note", 1)).unwrap().is_some());
}

#[test]
fn test_similar_names_do_not_collide() {
    let storage = memory_storage();
    let books = books(Arc::clone(&storage));
    let shelf = Collection::new(
        Description::builder("Bookshelf")
            .id_getter(|b: &Book| b.id)
            .id_setter(|b: &mut Book, id| b.id = id)
            .build()
            .unwrap(),
        JsonConverter,
        Arc::clone(&storage),
    )
    .unwrap();

    shelf.put_all(vec![book("x"), book("y")]).unwrap();
    books.put(book("Dune")).unwrap();

    assert_eq!(books.count().unwrap(), 1);
    assert_eq!(shelf.count().unwrap(), 2);
    assert!(books.clear().unwrap());
    assert_eq!(shelf.count().unwrap(), 2);
}

// =============================================================================
// Description Tests
// =============================================================================

#[test]
fn test_description_from_entity() {
    let description = Description::<Book>::of().unwrap();
    let mut b = book("Dune");

    description.set_id(&mut b, 9);

    assert_eq!(description.collection_name(), "Book");
    assert_eq!(description.id_of(&b), 9);
}

#[test]
fn test_description_requires_accessors() {
    let err = Description::<Note>::builder("Note")
        .id_getter(|n: &Note| n.key)
        .build()
        .unwrap_err();

    assert!(matches!(err, StashError::Config(_)));
}

#[test]
fn test_description_rejects_bad_names() {
    for name in ["", "Bad:Name"] {
        let result = Description::<Note>::builder(name)
            .id_getter(|n: &Note| n.key)
            .id_setter(|n: &mut Note, id| n.key = id)
            .build();
        assert!(matches!(result, Err(StashError::Config(_))));
    }
}

// =============================================================================
// Converter Tests
// =============================================================================

#[test]
fn test_bincode_converter_collection() {
    let books = Collection::new(Description::<Book>::of().unwrap(), BincodeConverter, memory_storage()).unwrap();

    let stored = books.put(book("Binary")).unwrap();

    assert_eq!(books.get(stored.id).unwrap(), Some(stored));
}

#[test]
fn test_undecodable_payload_is_codec_error() {
    let storage = memory_storage();
    storage.put(Record::new("Book:1", "not json")).unwrap();
    let books = books(storage);

    assert!(matches!(books.get(1), Err(StashError::Codec(_))));
    assert!(matches!(books.all(), Err(StashError::Codec(_))));
    assert_eq!(books.count().unwrap(), 1);
}

// =============================================================================
// Deferred Operation Tests
// =============================================================================

#[test]
fn test_async_variants_run_with_now() {
    let books = books(memory_storage());

    let stored = books.put_async(book("Dune")).now().unwrap();
    books.put_all_async(vec![book("A"), book("B")]).now().unwrap();

    assert_eq!(books.get_async(stored.id).now().unwrap(), Some(stored.clone()));
    assert_eq!(books.count_async().now().unwrap(), 3);
    assert_eq!(books.all_async().now().unwrap().len(), 3);
    assert_eq!(
        books
            .filter_async(|b: &Book| b.title == "A")
            .now()
            .unwrap()
            .len(),
        1
    );
    assert_eq!(books.delete_async(stored.id).now().unwrap(), Some(stored));
    assert!(books.clear_async().now().unwrap());
    assert_eq!(books.count().unwrap(), 0);
}

#[test]
fn test_call_is_lazy() {
    let books = books(memory_storage());

    let call = books.put_async(book("later"));
    assert_eq!(books.count().unwrap(), 0);

    call.now().unwrap();
    assert_eq!(books.count().unwrap(), 1);
}
