//! Collection Module
//!
//! Typed CRUD over a [`Storage`] for one entity type.
//!
//! ## Responsibilities
//! - Namespace every entity under `<collection name>:<id>`
//! - Assign sequence ids to entities stored with id 0
//! - Encode/decode entities through a [`Converter`]
//! - Offer each operation synchronously and as a deferred [`Call`]
//!
//! ## Sequence Ids
//! The counter starts at the largest id found among the collection's
//! keys when the collection is created, so ids stay unique across
//! restarts without a persisted counter. Storing an entity with an
//! explicit id raises the counter to at least that id.

mod key;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::call::Call;
use crate::converter::{Converter, JsonConverter};
use crate::description::Description;
use crate::error::{Result, StashError};
use crate::record::Record;
use crate::storage::Storage;

pub use key::{collection_prefix, entity_key, parse_id, KEY_SEPARATOR};

/// Entities of one type stored under a common key prefix
///
/// Cloning is cheap and clones share the sequence counter. Once the
/// counter reaches `u64::MAX`, storing an entity without an id fails.
pub struct Collection<T, C = JsonConverter> {
    /// Collection name + id accessors
    description: Description<T>,

    /// Entity codec
    converter: C,

    /// Shared record store
    storage: Arc<dyn Storage>,

    /// `<name>:`
    prefix: Arc<[u8]>,

    /// Last assigned (or seen) id
    sequence: Arc<AtomicU64>,
}

impl<T, C> Collection<T, C>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    C: Converter,
{
    /// Create a collection and seed its sequence from existing keys
    pub fn new(description: Description<T>, converter: C, storage: Arc<dyn Storage>) -> Result<Self> {
        Self::with_sequence(description, converter, storage, Arc::new(AtomicU64::new(0)))
    }

    /// Create a collection drawing ids from an existing counter
    ///
    /// The counter is raised to the largest id found among the
    /// collection's keys and is never lowered.
    pub(crate) fn with_sequence(
        description: Description<T>,
        converter: C,
        storage: Arc<dyn Storage>,
        sequence: Arc<AtomicU64>,
    ) -> Result<Self> {
        let prefix: Arc<[u8]> = collection_prefix(description.collection_name()).into();

        let mut last_id = 0u64;
        for key in storage.prefixed_with(&prefix)? {
            match parse_id(&key, &prefix) {
                Some(id) => last_id = last_id.max(id),
                None => tracing::warn!(
                    collection = description.collection_name(),
                    key = %String::from_utf8_lossy(&key),
                    "skipping key without numeric id"
                ),
            }
        }
        sequence.fetch_max(last_id, Ordering::SeqCst);

        tracing::debug!(
            collection = description.collection_name(),
            last_id = sequence.load(Ordering::SeqCst),
            "opened collection"
        );

        Ok(Self {
            description,
            converter,
            storage,
            prefix,
            sequence,
        })
    }

    pub fn name(&self) -> &str {
        self.description.collection_name()
    }

    pub fn description(&self) -> &Description<T> {
        &self.description
    }

    /// Largest id assigned or seen so far
    pub fn last_sequence_id(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Synchronous Operations
    // =========================================================================

    /// Entity stored under `id`
    pub fn get(&self, id: u64) -> Result<Option<T>> {
        match self.storage.get(&self.key(id))? {
            Some(record) => self.decode(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Store an entity, assigning an id first if it has none
    ///
    /// Returns the entity as stored, with its id set.
    pub fn put(&self, mut entity: T) -> Result<T> {
        let mut id = self.description.id_of(&entity);
        if id == 0 {
            id = self.next_sequence_id()?;
            self.description.set_id(&mut entity, id);
        } else {
            self.sequence.fetch_max(id, Ordering::SeqCst);
        }

        let payload = self.converter.to_bytes(&entity)?;
        self.storage.put(Record::new(self.key(id), payload))?;

        tracing::trace!(collection = self.name(), id, "stored entity");
        Ok(entity)
    }

    /// `put` every entity, in order
    pub fn put_all<I>(&self, entities: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = T>,
    {
        entities.into_iter().map(|entity| self.put(entity)).collect()
    }

    /// Remove and return the entity stored under `id`
    pub fn delete(&self, id: u64) -> Result<Option<T>> {
        match self.storage.remove(&self.key(id))? {
            Some(record) => self.decode(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Every entity of the collection, in no particular order
    pub fn all(&self) -> Result<Vec<T>> {
        self.filter(|_| true)
    }

    /// Entities for which `predicate` holds, in no particular order
    ///
    /// Every candidate is decoded before the predicate sees it.
    pub fn filter<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool,
    {
        let mut result = Vec::new();
        for key in self.keys()? {
            let Some(record) = self.storage.get(&key)? else {
                continue;
            };
            let entity = self.decode(&record)?;
            if predicate(&entity) {
                result.push(entity);
            }
        }
        Ok(result)
    }

    /// Remove every entity of the collection
    pub fn clear(&self) -> Result<bool> {
        for key in self.keys()? {
            self.storage.remove(&key)?;
        }
        Ok(true)
    }

    /// Number of stored entities, without decoding any
    pub fn count(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    // =========================================================================
    // Deferred Operations
    // =========================================================================

    pub fn get_async(&self, id: u64) -> Call<Option<T>> {
        let this = self.clone();
        Call::new(move || this.get(id))
    }

    pub fn put_async(&self, entity: T) -> Call<T> {
        let this = self.clone();
        Call::new(move || this.put(entity))
    }

    pub fn put_all_async(&self, entities: Vec<T>) -> Call<Vec<T>> {
        let this = self.clone();
        Call::new(move || this.put_all(entities))
    }

    pub fn delete_async(&self, id: u64) -> Call<Option<T>> {
        let this = self.clone();
        Call::new(move || this.delete(id))
    }

    pub fn all_async(&self) -> Call<Vec<T>> {
        let this = self.clone();
        Call::new(move || this.all())
    }

    pub fn filter_async<P>(&self, predicate: P) -> Call<Vec<T>>
    where
        P: Fn(&T) -> bool + Send + 'static,
    {
        let this = self.clone();
        Call::new(move || this.filter(predicate))
    }

    pub fn clear_async(&self) -> Call<bool> {
        let this = self.clone();
        Call::new(move || this.clear())
    }

    pub fn count_async(&self) -> Call<usize> {
        let this = self.clone();
        Call::new(move || this.count())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn next_sequence_id(&self) -> Result<u64> {
        self.sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| last.checked_add(1))
            .map(|last| last + 1)
            .map_err(|_| {
                StashError::Config(format!(
                    "Collection '{}' has no sequence ids left",
                    self.name()
                ))
            })
    }

    fn key(&self, id: u64) -> Vec<u8> {
        entity_key(self.name(), id)
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        self.storage.prefixed_with(&self.prefix)
    }

    fn decode(&self, record: &Record) -> Result<T> {
        self.converter.from_bytes(record.payload())
    }
}

impl<T, C: Clone> Clone for Collection<T, C> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            converter: self.converter.clone(),
            storage: Arc::clone(&self.storage),
            prefix: Arc::clone(&self.prefix),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<T, C> std::fmt::Debug for Collection<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.description.collection_name())
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
