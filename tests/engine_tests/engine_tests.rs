//! Tests for Engine
//!
//! These tests verify:
//! - Opening file-backed and in-memory engines
//! - Description registration and collection lookup
//! - Shared collection handles (one sequence per name)
//! - Key/value namespace
//! - Encryption and converter selection through the builder
//! - Restart with persisted data

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use stashkv::config::{Config, SyncStrategy};
use stashkv::converter::BincodeConverter;
use stashkv::description::{Description, Entity};
use stashkv::encryption::{AesGcmEncryption, EncryptionKey};
use stashkv::engine::{Engine, KEY_VALUE_COLLECTION};
use stashkv::storage::{MemoryStorage, Storage};
use stashkv::StashError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
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
struct Author {
    id: u64,
    name: String,
}

fn book(title: &str) -> Book {
    Book {
        id: 0,
        title: title.to_string(),
    }
}

fn author_description() -> Description<Author> {
    Description::builder("Author")
        .id_getter(|a: &Author| a.id)
        .id_setter(|a: &mut Author, id| a.id = id)
        .build()
        .unwrap()
}

fn temp_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .path(temp_dir.path().join("engine.db"))
        .sync_strategy(SyncStrategy::EveryWrite) // Sync every write for test reliability
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(temp_config(&temp_dir)).unwrap();
    (temp_dir, engine)
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_unregistered_collection_is_config_error() {
    let engine = Engine::in_memory();

    let err = engine.collection::<Book>("Book").unwrap_err();

    assert!(matches!(err, StashError::Config(_)));
}

#[test]
fn test_registered_collection_round_trip() {
    let engine = Engine::in_memory();
    engine.register(Description::<Book>::of().unwrap()).unwrap();

    let books = engine.collection::<Book>("Book").unwrap();
    let stored = books.put(book("Dune")).unwrap();

    assert_eq!(books.get(stored.id).unwrap(), Some(stored));
    assert_eq!(engine.collection_names(), vec!["Book".to_string()]);
}

#[test]
fn test_type_mismatch_is_config_error() {
    let engine = Engine::in_memory();
    engine.register(author_description()).unwrap();

    let err = engine.collection::<Book>("Author").unwrap_err();

    assert!(matches!(err, StashError::Config(_)));
}

#[test]
fn test_type_mismatch_after_cache_is_config_error() {
    let engine = Engine::in_memory();
    engine.register(author_description()).unwrap();
    engine.collection::<Author>("Author").unwrap();

    assert!(matches!(
        engine.collection::<Book>("Author"),
        Err(StashError::Config(_))
    ));
}

#[test]
fn test_repeated_lookups_share_sequence() {
    let engine = Engine::in_memory();
    engine.register(Description::<Book>::of().unwrap()).unwrap();

    let first = engine.collection::<Book>("Book").unwrap();
    let second = engine.collection::<Book>("Book").unwrap();

    assert_eq!(first.put(book("a")).unwrap().id, 1);
    assert_eq!(second.put(book("b")).unwrap().id, 2);
    assert_eq!(first.last_sequence_id(), 2);
}

#[test]
fn test_collection_of_registers_entity() {
    let engine = Engine::in_memory();

    let books = engine.collection_of::<Book>().unwrap();
    books.put(book("Dune")).unwrap();

    assert_eq!(engine.collection_names(), vec!["Book".to_string()]);
    assert_eq!(engine.collection::<Book>("Book").unwrap().count().unwrap(), 1);
}

#[test]
fn test_register_replaces_description() {
    let engine = Engine::in_memory();
    engine.register(Description::<Book>::of().unwrap()).unwrap();
    let books = engine.collection::<Book>("Book").unwrap();
    books.put(book("Dune")).unwrap();

    // Same name, different type
    let replacement = Description::builder("Book")
        .id_getter(|a: &Author| a.id)
        .id_setter(|a: &mut Author, id| a.id = id)
        .build()
        .unwrap();
    engine.register(replacement).unwrap();

    assert!(matches!(
        engine.collection::<Book>("Book"),
        Err(StashError::Config(_))
    ));
    let authors = engine.collection::<Author>("Book").unwrap();
    assert_eq!(authors.last_sequence_id(), 1);
}

#[test]
fn test_handles_from_before_reregistration_share_sequence() {
    let engine = Engine::in_memory();
    engine.register(Description::<Book>::of().unwrap()).unwrap();
    let old = engine.collection::<Book>("Book").unwrap();
    old.put(book("a")).unwrap();

    engine.register(Description::<Book>::of().unwrap()).unwrap();
    let new = engine.collection::<Book>("Book").unwrap();

    let from_old = old.put(book("from-old")).unwrap();
    let from_new = new.put(book("from-new")).unwrap();

    assert_ne!(from_old.id, from_new.id);
    assert_eq!(new.count().unwrap(), 3);
    assert_eq!(new.get(from_old.id).unwrap(), Some(from_old));
}

#[test]
fn test_reserved_name_rejected() {
    let engine = Engine::in_memory();
    let description = Description::builder(KEY_VALUE_COLLECTION)
        .id_getter(|b: &Book| b.id)
        .id_setter(|b: &mut Book, id| b.id = id)
        .build()
        .unwrap();

    assert!(matches!(
        engine.register(description),
        Err(StashError::Config(_))
    ));
}

#[test]
fn test_concurrent_collection_lookups() {
    let engine = Arc::new(Engine::in_memory());
    engine.register(Description::<Book>::of().unwrap()).unwrap();
    let mut handles = Vec::new();

    for t in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let books = engine.collection::<Book>("Book").unwrap();
            for i in 0..10 {
                books.put(book(&format!("{}-{}", t, i))).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let books = engine.collection::<Book>("Book").unwrap();
    assert_eq!(books.count().unwrap(), 40);
    assert_eq!(books.last_sequence_id(), 40);
}

// =============================================================================
// Key/Value Tests
// =============================================================================

#[test]
fn test_key_value_round_trip() {
    let engine = Engine::in_memory();

    engine.put_value("greeting", "hello".to_string()).now().unwrap();

    assert_eq!(
        engine.get_value::<String>("greeting").now().unwrap(),
        Some("hello".to_string())
    );
    assert!(engine
        .storage()
        .get(b"k-v:greeting")
        .unwrap()
        .is_some());
}

#[test]
fn test_key_value_missing_and_delete() {
    let engine = Engine::in_memory();

    assert_eq!(engine.get_value::<u32>("missing").now().unwrap(), None);
    assert!(!engine.delete_value("missing").now().unwrap());

    engine.put_value("n", 7u32).now().unwrap();
    assert!(engine.delete_value("n").now().unwrap());
    assert_eq!(engine.get_value::<u32>("n").now().unwrap(), None);
}

#[test]
fn test_key_values_stay_out_of_collections() {
    let engine = Engine::in_memory();
    let books = engine.collection_of::<Book>().unwrap();
    books.put(book("Dune")).unwrap();

    engine.put_value("Book:99", 1u8).now().unwrap();

    assert_eq!(books.count().unwrap(), 1);
}

// =============================================================================
// Builder & Persistence Tests
// =============================================================================

#[test]
fn test_open_and_restart() {
    let temp_dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(temp_config(&temp_dir)).unwrap();
        let books = engine.collection_of::<Book>().unwrap();
        books.put_all(vec![book("A"), book("B")]).unwrap();
        engine.put_value("version", 3u32).now().unwrap();
        engine.flush().unwrap();
    }

    let engine = Engine::open(temp_config(&temp_dir)).unwrap();
    let books = engine.collection_of::<Book>().unwrap();

    assert_eq!(books.count().unwrap(), 2);
    assert_eq!(books.put(book("C")).unwrap().id, 3);
    assert_eq!(engine.get_value::<u32>("version").now().unwrap(), Some(3));
}

#[test]
fn test_builder_with_encryption_and_registration() {
    let temp_dir = TempDir::new().unwrap();
    let key = EncryptionKey::generate();

    {
        let engine = Engine::builder(temp_config(&temp_dir))
            .encryption(Arc::new(AesGcmEncryption::new(&key)))
            .register(Description::<Book>::of().unwrap())
            .open()
            .unwrap();
        engine
            .collection::<Book>("Book")
            .unwrap()
            .put(book("Secret"))
            .unwrap();
    }

    let engine = Engine::builder(temp_config(&temp_dir))
        .encryption(Arc::new(AesGcmEncryption::new(&key)))
        .register(Description::<Book>::of().unwrap())
        .open()
        .unwrap();
    let books = engine.collection::<Book>("Book").unwrap();

    assert_eq!(books.get(1).unwrap().unwrap().title, "Secret");
}

#[test]
fn test_builder_with_bincode_converter() {
    let temp_dir = TempDir::new().unwrap();

    let engine = Engine::builder(temp_config(&temp_dir))
        .converter(BincodeConverter)
        .open()
        .unwrap();
    let books = engine.collection_of::<Book>().unwrap();
    let stored = books.put(book("Binary")).unwrap();

    assert_eq!(books.get(stored.id).unwrap(), Some(stored));
}

#[test]
fn test_builder_rejects_reserved_registration() {
    let temp_dir = TempDir::new().unwrap();
    let description = Description::builder(KEY_VALUE_COLLECTION)
        .id_getter(|b: &Book| b.id)
        .id_setter(|b: &mut Book, id| b.id = id)
        .build()
        .unwrap();

    let result = Engine::builder(temp_config(&temp_dir))
        .register(description)
        .open();

    assert!(matches!(result, Err(StashError::Config(_))));
}

#[test]
fn test_with_storage() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let engine = Engine::with_storage(Arc::clone(&storage), BincodeConverter);

    engine.put_value("k", 1u64).now().unwrap();

    assert_eq!(storage.prefixed_with(b"k-v:").unwrap(), vec![b"k-v:k".to_vec()]);
}

#[test]
fn test_setup_helper_opens_empty_engine() {
    let (_temp, engine) = setup_temp_engine();

    assert!(engine.collection_names().is_empty());
    assert!(engine.storage().prefixed_with(b"").unwrap().is_empty());
}
