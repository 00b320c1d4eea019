//! Description Module
//!
//! Per-type knowledge a collection needs about its entities: the
//! collection name used for key namespacing and a typed accessor pair
//! for the numeric id. An id of 0 means "not assigned yet".

use std::fmt;
use std::sync::Arc;

use crate::collection::KEY_SEPARATOR;
use crate::error::{Result, StashError};

type IdGetter<T> = Arc<dyn Fn(&T) -> u64 + Send + Sync>;
type IdSetter<T> = Arc<dyn Fn(&mut T, u64) + Send + Sync>;

/// Entity type that describes itself
///
/// ```ignore
/// impl Entity for Book {
///     const COLLECTION: &'static str = "Book";
///     fn id(&self) -> u64 { self.id }
///     fn set_id(&mut self, id: u64) { self.id = id }
/// }
/// ```
pub trait Entity {
    /// Collection name; must not be empty or contain `:`
    const COLLECTION: &'static str;

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);
}

/// How to read and assign the id of a `T`, and where `T`s are stored
pub struct Description<T> {
    collection_name: String,
    get_id: IdGetter<T>,
    set_id: IdSetter<T>,
}

impl<T> Description<T> {
    /// Start building a description for collection `name`
    pub fn builder(name: impl Into<String>) -> DescriptionBuilder<T> {
        DescriptionBuilder {
            collection_name: name.into(),
            get_id: None,
            set_id: None,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Id of `entity`, 0 when unassigned
    pub fn id_of(&self, entity: &T) -> u64 {
        (self.get_id)(entity)
    }

    pub fn set_id(&self, entity: &mut T, id: u64) {
        (self.set_id)(entity, id)
    }
}

impl<T: Entity + 'static> Description<T> {
    /// Description taken from the [`Entity`] implementation
    pub fn of() -> Result<Self> {
        Self::builder(T::COLLECTION)
            .id_getter(T::id)
            .id_setter(T::set_id)
            .build()
    }
}

impl<T> Clone for Description<T> {
    fn clone(&self) -> Self {
        Self {
            collection_name: self.collection_name.clone(),
            get_id: Arc::clone(&self.get_id),
            set_id: Arc::clone(&self.set_id),
        }
    }
}

impl<T> fmt::Debug for Description<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Description")
            .field("collection_name", &self.collection_name)
            .finish_non_exhaustive()
    }
}

/// Builder for Description
///
/// Both accessors are required; `build` rejects an incomplete builder.
pub struct DescriptionBuilder<T> {
    collection_name: String,
    get_id: Option<IdGetter<T>>,
    set_id: Option<IdSetter<T>>,
}

impl<T> DescriptionBuilder<T> {
    /// Set the function reading the id
    pub fn id_getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> u64 + Send + Sync + 'static,
    {
        self.get_id = Some(Arc::new(f));
        self
    }

    /// Set the function assigning the id
    pub fn id_setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T, u64) + Send + Sync + 'static,
    {
        self.set_id = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<Description<T>> {
        validate_collection_name(&self.collection_name)?;

        let get_id = self.get_id.ok_or_else(|| {
            StashError::Config(format!(
                "Description of '{}' has no id getter",
                self.collection_name
            ))
        })?;
        let set_id = self.set_id.ok_or_else(|| {
            StashError::Config(format!(
                "Description of '{}' has no id setter",
                self.collection_name
            ))
        })?;

        Ok(Description {
            collection_name: self.collection_name,
            get_id,
            set_id,
        })
    }
}

pub(crate) fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StashError::Config("Collection name must not be empty".to_string()));
    }
    if name.contains(KEY_SEPARATOR) {
        return Err(StashError::Config(format!(
            "Collection name '{}' must not contain '{}'",
            name, KEY_SEPARATOR
        )));
    }
    Ok(())
}
