//! Engine Module
//!
//! Facade over one store, one converter and the registry of entity
//! descriptions.
//!
//! ```text
//!   Engine<C>
//!   ├── storage:   Arc<dyn Storage>        (FileStorage / MemoryStorage / custom)
//!   ├── converter: C                       (JsonConverter by default)
//!   └── registry:  RwLock<Registry>
//!         ├── descriptions  name → Description<T>
//!         ├── collections   name → Collection<T, C>   (created on first use)
//!         └── sequences     name → Arc<AtomicU64>     (outlives re-registration)
//!
//!   keys:  "<collection>:<id>"   entities
//!          "k-v:<key>"           raw key/value namespace
//! ```
//!
//! ## Responsibilities
//! - Open the store described by a [`Config`]
//! - Hand out one shared [`Collection`] handle per registered name
//! - Serve the key/value namespace beside the collections

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::call::Call;
use crate::collection::{collection_prefix, Collection};
use crate::config::Config;
use crate::converter::{Converter, JsonConverter};
use crate::description::{Description, Entity};
use crate::encryption::{Encryption, NoEncryption};
use crate::error::{Result, StashError};
use crate::record::Record;
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Reserved name of the raw key/value namespace
pub const KEY_VALUE_COLLECTION: &str = "k-v";

/// Type-erased registry entry
type Erased = Box<dyn Any + Send + Sync>;

/// Descriptions and the collections built from them, keyed by name
#[derive(Default)]
struct Registry {
    descriptions: HashMap<String, Erased>,
    collections: HashMap<String, Erased>,

    /// One id counter per name, shared by every handle ever built for it
    sequences: HashMap<String, Arc<AtomicU64>>,
}

impl Registry {
    fn insert<T: 'static>(&mut self, description: Description<T>) -> Result<()> {
        let name = description.collection_name().to_string();
        if name == KEY_VALUE_COLLECTION {
            return Err(StashError::Config(format!(
                "Collection name '{}' is reserved",
                name
            )));
        }

        self.collections.remove(&name);
        if self.descriptions.insert(name.clone(), Box::new(description)).is_some() {
            tracing::debug!(collection = %name, "replaced description");
        } else {
            tracing::debug!(collection = %name, "registered description");
        }
        Ok(())
    }
}

/// The embedded store
pub struct Engine<C = JsonConverter> {
    /// Record store shared with every collection
    storage: Arc<dyn Storage>,

    /// Entity and value codec
    converter: C,

    /// Registered descriptions + cached collections
    registry: RwLock<Registry>,
}

// =============================================================================
// Constructors
// =============================================================================

impl Engine<JsonConverter> {
    /// Open (or create) a file-backed engine with JSON encoding
    pub fn open(config: Config) -> Result<Self> {
        Self::builder(config).open()
    }

    pub fn builder(config: Config) -> EngineBuilder<JsonConverter> {
        EngineBuilder {
            config,
            encryption: Arc::new(NoEncryption),
            converter: JsonConverter,
            pending: Vec::new(),
        }
    }

    /// Volatile engine over a [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()), JsonConverter)
    }
}

impl<C: Converter> Engine<C> {
    /// Engine over an already constructed store
    pub fn with_storage(storage: Arc<dyn Storage>, converter: C) -> Self {
        Self {
            storage,
            converter,
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Sync the store to its backing medium
    pub fn flush(&self) -> Result<()> {
        self.storage.flush()
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Register (or replace) the description of a collection
    ///
    /// Replacing drops the cached collection handle; the next
    /// [`Engine::collection`] call builds a fresh one. Old and new
    /// handles keep drawing ids from the same counter.
    pub fn register<T: 'static>(&self, description: Description<T>) -> Result<()> {
        self.registry.write().insert(description)
    }

    /// Names of all registered collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().descriptions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Collection registered under `name`
    ///
    /// Repeated calls return handles sharing one sequence counter.
    pub fn collection<T>(&self, name: &str) -> Result<Collection<T, C>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        if let Some(cached) = self.registry.read().collections.get(name) {
            return downcast_collection(name, cached);
        }

        let mut registry = self.registry.write();

        // Another caller may have built it between the two locks
        if let Some(cached) = registry.collections.get(name) {
            return downcast_collection(name, cached);
        }

        let description = registry
            .descriptions
            .get(name)
            .ok_or_else(|| StashError::Config(format!("Collection '{}' is not registered", name)))?
            .downcast_ref::<Description<T>>()
            .ok_or_else(|| type_mismatch::<T>(name))?
            .clone();

        let sequence = Arc::clone(registry.sequences.entry(name.to_string()).or_default());
        let collection = Collection::with_sequence(
            description,
            self.converter.clone(),
            Arc::clone(&self.storage),
            sequence,
        )?;
        registry
            .collections
            .insert(name.to_string(), Box::new(collection.clone()));

        Ok(collection)
    }

    /// Collection of an [`Entity`] type, registering it on first use
    pub fn collection_of<T>(&self) -> Result<Collection<T, C>>
    where
        T: Entity + Serialize + DeserializeOwned + Send + 'static,
    {
        let registered = self.registry.read().descriptions.contains_key(T::COLLECTION);
        if !registered {
            self.register(Description::<T>::of()?)?;
        }
        self.collection(T::COLLECTION)
    }

    // =========================================================================
    // Key/Value Namespace
    // =========================================================================

    /// Value stored under `key`
    pub fn get_value<T>(&self, key: &str) -> Call<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let converter = self.converter.clone();
        let key = key_value_key(key);

        Call::new(move || match storage.get(&key)? {
            Some(record) => converter.from_bytes(record.payload()).map(Some),
            None => Ok(None),
        })
    }

    /// Store `value` under `key`, returning it
    pub fn put_value<T>(&self, key: &str, value: T) -> Call<T>
    where
        T: Serialize + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let converter = self.converter.clone();
        let key = key_value_key(key);

        Call::new(move || {
            let payload = converter.to_bytes(&value)?;
            storage.put(Record::new(key, payload))?;
            Ok(value)
        })
    }

    /// Remove `key`; `true` if something was stored under it
    pub fn delete_value(&self, key: &str) -> Call<bool> {
        let storage = Arc::clone(&self.storage);
        let key = key_value_key(key);

        Call::new(move || Ok(storage.remove(&key)?.is_some()))
    }
}

impl<C> fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Engine")
            .field("descriptions", &registry.descriptions.len())
            .field("collections", &registry.collections.len())
            .finish_non_exhaustive()
    }
}

fn key_value_key(key: &str) -> Vec<u8> {
    let mut full = collection_prefix(KEY_VALUE_COLLECTION);
    full.extend_from_slice(key.as_bytes());
    full
}

fn downcast_collection<T, C>(name: &str, cached: &Erased) -> Result<Collection<T, C>>
where
    T: 'static,
    C: Converter,
{
    cached
        .downcast_ref::<Collection<T, C>>()
        .cloned()
        .ok_or_else(|| type_mismatch::<T>(name))
}

fn type_mismatch<T>(name: &str) -> StashError {
    StashError::Config(format!(
        "Collection '{}' is not registered for type {}",
        name,
        std::any::type_name::<T>()
    ))
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for Engine
pub struct EngineBuilder<C> {
    config: Config,
    encryption: Arc<dyn Encryption>,
    converter: C,
    pending: Vec<Box<dyn FnOnce(&mut Registry) -> Result<()> + Send>>,
}

impl<C: Converter> EngineBuilder<C> {
    /// Payload cipher for the store file
    pub fn encryption(mut self, encryption: Arc<dyn Encryption>) -> Self {
        self.encryption = encryption;
        self
    }

    /// Codec for entities and values
    pub fn converter<D: Converter>(self, converter: D) -> EngineBuilder<D> {
        EngineBuilder {
            config: self.config,
            encryption: self.encryption,
            converter,
            pending: self.pending,
        }
    }

    /// Register a description when the engine opens
    pub fn register<T: 'static>(mut self, description: Description<T>) -> Self {
        self.pending
            .push(Box::new(move |registry: &mut Registry| registry.insert(description)));
        self
    }

    /// Open the store file and apply the registrations
    pub fn open(self) -> Result<Engine<C>> {
        let mut registry = Registry::default();
        for register in self.pending {
            register(&mut registry)?;
        }

        let storage = FileStorage::open_with_encryption(&self.config, self.encryption)?;
        tracing::info!(
            path = %self.config.path.display(),
            records = storage.len(),
            "engine opened"
        );

        Ok(Engine {
            storage: Arc::new(storage),
            converter: self.converter,
            registry: RwLock::new(registry),
        })
    }
}
