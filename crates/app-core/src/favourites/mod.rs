//! Favourite events
//!
//! This module keeps the device-local list of favourited event date variants.
//! [`FavouritesRepository`] is the only writer of the persisted list; every
//! screen reads and mutates favourites through it and can subscribe to its
//! changes instead of re-reading storage.
//!
//! Favourites are stored as full event snapshots rather than ids. A snapshot
//! survives the event disappearing from the feed, but it keeps the fields the
//! event had when it was favourited (a later price change is not reflected).

pub mod codec;
mod repository;

pub use codec::{DecodedFavourites, SCHEMA_VERSION};
pub use repository::FavouritesRepository;

use serde::Serialize;
use storage::{KvError, PersistenceError};
use thiserror::Error;

use crate::events::{Event, EventKey};

/// Storage key of the persisted favourites list
pub const DEFAULT_STORAGE_KEY: &str = "favouriteEvents";

/// Default capacity of the change broadcast channel
const DEFAULT_CHANGE_BUFFER: usize = 16;

/// A favourited event snapshot, captured when it was favourited
pub type FavouriteEntry = Event;

/// Persistence problems reported alongside a favourites result
///
/// None of these are fatal: reads degrade to an empty list and failed writes
/// keep the in-memory change.
#[derive(Debug, Error)]
pub enum PersistenceCondition {
    /// The store could not be read; the list was treated as empty
    #[error("Failed to read favourites: {0}")]
    ReadFailed(#[source] KvError),

    /// Stored bytes could not be decoded; the list was treated as empty
    #[error("Stored favourites are corrupt: {0}")]
    Corrupt(#[source] PersistenceError),

    /// The change was applied in memory but could not be persisted
    #[error("Failed to write favourites: {0}")]
    WriteFailed(#[source] KvError),
}

/// A favourites result plus any persistence condition hit while producing it
#[derive(Debug)]
#[must_use]
pub struct Outcome<T> {
    /// The result value, valid even when a condition is present
    pub value: T,
    /// Persistence condition, if any
    pub condition: Option<PersistenceCondition>,
}

impl<T> Outcome<T> {
    fn new(value: T, condition: Option<PersistenceCondition>) -> Self {
        Self { value, condition }
    }

    /// Whether no persistence condition was hit
    pub fn is_clean(&self) -> bool {
        self.condition.is_none()
    }

    /// Treat any persistence condition as an error
    pub fn into_result(self) -> std::result::Result<T, PersistenceCondition> {
        match self.condition {
            Some(condition) => Err(condition),
            None => Ok(self.value),
        }
    }

    /// Map the value, keeping the condition
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome { value: f(self.value), condition: self.condition }
    }
}

/// Result of [`FavouritesRepository::toggle`]
#[derive(Debug, Clone, PartialEq)]
pub struct Toggled {
    /// Favourites after the toggle
    pub collection: FavouritesCollection,
    /// True when the event was added, false when it was removed
    pub was_added: bool,
}

/// Change notifications broadcast by the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavouritesChange {
    /// An entry was appended
    Added(EventKey),
    /// An entry was removed
    Removed(EventKey),
    /// The list was replaced by what storage holds
    Reloaded {
        /// Number of entries after the reload
        count: usize,
    },
    /// The list was emptied by the user
    Cleared,
}

/// Favourites configuration
#[derive(Debug, Clone)]
pub struct FavouritesConfig {
    /// Key under which the list is persisted
    pub storage_key: String,
    /// Capacity of the change broadcast channel
    pub change_buffer: usize,
}

impl Default for FavouritesConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            change_buffer: DEFAULT_CHANGE_BUFFER,
        }
    }
}

impl FavouritesConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist under a different key
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the change broadcast capacity (at least 1)
    pub fn change_buffer(mut self, capacity: usize) -> Self {
        self.change_buffer = capacity.max(1);
        self
    }
}

/// Ordered, duplicate-free list of favourited event snapshots
///
/// Entries keep insertion order. No two entries share an [`EventKey`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct FavouritesCollection {
    entries: Vec<FavouriteEntry>,
}

impl FavouritesCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from stored entries, keeping the first of any duplicates
    ///
    /// Returns the collection and the number of duplicates dropped.
    pub fn from_entries(entries: Vec<FavouriteEntry>) -> (Self, usize) {
        let mut collection = Self::new();
        let mut dropped = 0;
        for entry in entries {
            if !collection.insert(entry) {
                dropped += 1;
            }
        }
        (collection, dropped)
    }

    /// Entries in display order
    pub fn entries(&self) -> &[FavouriteEntry] {
        &self.entries
    }

    /// Iterate over entries in display order
    pub fn iter(&self) -> std::slice::Iter<'_, FavouriteEntry> {
        self.entries.iter()
    }

    /// Keys in display order
    pub fn keys(&self) -> impl Iterator<Item = EventKey> + '_ {
        self.entries.iter().map(Event::key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry with this key exists
    pub fn contains(&self, key: EventKey) -> bool {
        self.position(key).is_some()
    }

    /// The entry with this key
    pub fn get(&self, key: EventKey) -> Option<&FavouriteEntry> {
        self.position(key).map(|index| &self.entries[index])
    }

    fn position(&self, key: EventKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key() == key)
    }

    /// Append unless the key is present; existing snapshots are never replaced
    ///
    /// Prices are normalized so every stored snapshot can be encoded.
    pub(crate) fn insert(&mut self, mut entry: FavouriteEntry) -> bool {
        if self.contains(entry.key()) {
            return false;
        }
        entry.normalize_prices();
        self.entries.push(entry);
        true
    }

    pub(crate) fn remove(&mut self, key: EventKey) -> Option<FavouriteEntry> {
        self.position(key).map(|index| self.entries.remove(index))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a FavouritesCollection {
    type Item = &'a FavouriteEntry;
    type IntoIter = std::slice::Iter<'a, FavouriteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
