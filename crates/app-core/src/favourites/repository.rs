//! Favourites repository
//!
//! Owns the canonical favourites list and serialises every read-modify-write
//! of the persisted blob behind one async mutex.

use std::sync::Arc;
use storage::{KeyValueStore, KvError};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use super::codec;
use super::{
    FavouritesChange, FavouritesCollection, FavouritesConfig, FavouriteEntry, Outcome,
    PersistenceCondition, Toggled,
};
use crate::events::EventKey;

#[derive(Debug, Default)]
struct RepoState {
    collection: FavouritesCollection,
    loaded: bool,
    // The last write failed; memory is ahead of storage
    dirty: bool,
}

/// Single writer of the persisted favourites list
///
/// All operations take the same lock, including the store write, so
/// concurrent mutations are applied one after another and never lose each
/// other's changes. Observers registered with [`subscribe`](Self::subscribe)
/// or [`changes`](Self::changes) are notified before a mutating call returns.
///
/// # Example
///
/// ```no_run
/// # use app_core::events::Event;
/// # use app_core::favourites::{FavouritesConfig, FavouritesRepository};
/// # use std::sync::Arc;
/// # use storage::KvStore;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(KvStore::in_memory()?);
/// let favourites = FavouritesRepository::new(store, FavouritesConfig::default());
///
/// let loaded = favourites.load().await;
/// if let Some(condition) = &loaded.condition {
///     eprintln!("favourites degraded: {condition}");
/// }
///
/// let toggled = favourites.toggle(Event::new(216, 1, "Mondays Social Outdoor")).await;
/// assert!(toggled.value.was_added);
/// # Ok(())
/// # }
/// ```
pub struct FavouritesRepository {
    store: Arc<dyn KeyValueStore>,
    config: FavouritesConfig,
    state: Mutex<RepoState>,
    collection_tx: watch::Sender<FavouritesCollection>,
    changes_tx: broadcast::Sender<FavouritesChange>,
}

impl FavouritesRepository {
    /// Create a repository over a store; nothing is read until first use
    pub fn new(store: Arc<dyn KeyValueStore>, config: FavouritesConfig) -> Self {
        let (collection_tx, _) = watch::channel(FavouritesCollection::new());
        let (changes_tx, _) = broadcast::channel(config.change_buffer.max(1));

        Self { store, config, state: Mutex::new(RepoState::default()), collection_tx, changes_tx }
    }

    /// Storage key this repository owns
    pub fn storage_key(&self) -> &str {
        &self.config.storage_key
    }

    /// Subscribe to the latest collection
    pub fn subscribe(&self) -> watch::Receiver<FavouritesCollection> {
        self.collection_tx.subscribe()
    }

    /// Subscribe to individual change events
    pub fn changes(&self) -> broadcast::Receiver<FavouritesChange> {
        self.changes_tx.subscribe()
    }

    /// Whether storage has been read at least once
    pub async fn is_loaded(&self) -> bool {
        self.state.lock().await.loaded
    }

    /// Read the persisted list, replacing the in-memory one
    ///
    /// Missing data loads as empty. On the first load, unreadable or
    /// undecodable data also loads as empty and is reported through the
    /// outcome's condition; on later loads the in-memory list is kept instead.
    /// Changes whose write failed are not discarded: they are written again
    /// and the in-memory list is returned.
    pub async fn load(&self) -> Outcome<FavouritesCollection> {
        let mut state = self.state.lock().await;
        let condition = self.sync_with_store(&mut state).await;
        let count = state.collection.len();

        self.publish(&state.collection, FavouritesChange::Reloaded { count });
        Outcome::new(state.collection.clone(), condition)
    }

    /// Whether an entry with this key is favourited
    pub async fn contains(&self, key: EventKey) -> bool {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.collection.contains(key)
    }

    /// Number of favourites
    pub async fn count(&self) -> usize {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.collection.len()
    }

    /// Snapshot of the current list
    pub async fn entries(&self) -> FavouritesCollection {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.collection.clone()
    }

    /// Favourite an event
    ///
    /// Adding a key that is already present changes nothing and writes
    /// nothing; the stored snapshot is kept.
    pub async fn add(&self, entry: FavouriteEntry) -> Outcome<FavouritesCollection> {
        let mut state = self.state.lock().await;
        let load_condition = self.ensure_loaded(&mut state).await;

        let key = entry.key();
        if !state.collection.insert(entry) {
            debug!(%key, "Favourite already present");
            return Outcome::new(state.collection.clone(), load_condition);
        }

        let condition = self.commit(&mut state, FavouritesChange::Added(key)).await;
        Outcome::new(state.collection.clone(), condition.or(load_condition))
    }

    /// Unfavourite an event
    ///
    /// Removing a key that is not present changes nothing and writes nothing.
    pub async fn remove(&self, key: EventKey) -> Outcome<FavouritesCollection> {
        let mut state = self.state.lock().await;
        let load_condition = self.ensure_loaded(&mut state).await;

        if state.collection.remove(key).is_none() {
            debug!(%key, "Favourite not present");
            return Outcome::new(state.collection.clone(), load_condition);
        }

        let condition = self.commit(&mut state, FavouritesChange::Removed(key)).await;
        Outcome::new(state.collection.clone(), condition.or(load_condition))
    }

    /// Add the event if absent, remove it if present
    pub async fn toggle(&self, entry: FavouriteEntry) -> Outcome<Toggled> {
        let mut state = self.state.lock().await;
        let load_condition = self.ensure_loaded(&mut state).await;

        let key = entry.key();
        let (was_added, change) = if state.collection.remove(key).is_some() {
            (false, FavouritesChange::Removed(key))
        } else {
            state.collection.insert(entry);
            (true, FavouritesChange::Added(key))
        };

        let condition = self.commit(&mut state, change).await;
        Outcome::new(
            Toggled { collection: state.collection.clone(), was_added },
            condition.or(load_condition),
        )
    }

    /// Remove every favourite
    ///
    /// Always writes, so this also replaces a corrupt blob with an empty list.
    pub async fn clear(&self) -> Outcome<FavouritesCollection> {
        let mut state = self.state.lock().await;
        state.collection.clear();
        state.loaded = true;

        let condition = self.commit(&mut state, FavouritesChange::Cleared).await;
        Outcome::new(state.collection.clone(), condition)
    }

    async fn ensure_loaded(&self, state: &mut RepoState) -> Option<PersistenceCondition> {
        if state.loaded {
            return None;
        }

        let condition = self.sync_with_store(state).await;
        let count = state.collection.len();
        self.publish(&state.collection, FavouritesChange::Reloaded { count });
        condition
    }

    async fn sync_with_store(&self, state: &mut RepoState) -> Option<PersistenceCondition> {
        if state.dirty {
            debug!(key = self.storage_key(), "Retrying write of unpersisted favourites");
            let condition = self.write(&state.collection).await;
            state.dirty = condition.is_some();
            return condition;
        }

        let (collection, condition) = self.read().await;
        if condition.is_none() || !state.loaded {
            state.collection = collection;
        } else {
            warn!(key = self.storage_key(), "Reload failed, keeping in-memory favourites");
        }
        state.loaded = true;
        condition
    }

    async fn read(&self) -> (FavouritesCollection, Option<PersistenceCondition>) {
        let key = self.storage_key();

        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key, "No stored favourites");
                return (FavouritesCollection::new(), None);
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read favourites");
                return (FavouritesCollection::new(), Some(PersistenceCondition::ReadFailed(e)));
            }
        };

        match codec::decode(&bytes) {
            Ok(decoded) => {
                if decoded.dropped_duplicates > 0 {
                    warn!(key, dropped = decoded.dropped_duplicates, "Dropped duplicate favourites");
                }
                if decoded.needs_upgrade() {
                    debug!(key, version = decoded.version, "Favourites will be rewritten on next change");
                }
                info!(key, count = decoded.collection.len(), "Loaded favourites");
                (decoded.collection, None)
            }
            Err(e) => {
                warn!(key, error = %e, "Stored favourites are corrupt");
                (FavouritesCollection::new(), Some(PersistenceCondition::Corrupt(e)))
            }
        }
    }

    /// Persist and notify; the in-memory change stands even if the write fails
    async fn commit(
        &self,
        state: &mut RepoState,
        change: FavouritesChange,
    ) -> Option<PersistenceCondition> {
        let condition = self.write(&state.collection).await;
        state.dirty = condition.is_some();
        self.publish(&state.collection, change);
        condition
    }

    async fn write(&self, collection: &FavouritesCollection) -> Option<PersistenceCondition> {
        let key = self.storage_key();

        let bytes = match codec::encode(collection) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode favourites");
                let error = KvError::Unavailable(format!("encoding failed: {e}"));
                return Some(PersistenceCondition::WriteFailed(error));
            }
        };

        match self.store.set(key, bytes).await {
            Ok(()) => {
                debug!(key, count = collection.len(), "Persisted favourites");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to persist favourites, keeping in-memory change");
                Some(PersistenceCondition::WriteFailed(e))
            }
        }
    }

    fn publish(&self, collection: &FavouritesCollection, change: FavouritesChange) {
        self.collection_tx.send_replace(collection.clone());
        // No subscribers is fine
        let _ = self.changes_tx.send(change);
    }
}
