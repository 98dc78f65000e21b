//! Process-wide application context
//!
//! Owns the device store and the single favourites repository, which is
//! created and loaded on first use and lives until the process exits.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use app_core::favourites::{FavouritesConfig, FavouritesRepository};
use storage::{KeyValueStore, KvConfig, KvError, KvStore};

/// Context errors
#[derive(Debug, Error)]
pub enum ContextError {
    /// The device store could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),
}

/// Result type for context operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Device key-value store settings
    pub kv: KvConfig,
    /// Favourites settings
    pub favourites: FavouritesConfig,
}

impl AppConfig {
    /// Configuration with the store at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self { kv: KvConfig::new(path), favourites: FavouritesConfig::default() }
    }

    /// Replace the key-value store settings
    pub fn kv(mut self, kv: KvConfig) -> Self {
        self.kv = kv;
        self
    }

    /// Replace the favourites settings
    pub fn favourites(mut self, favourites: FavouritesConfig) -> Self {
        self.favourites = favourites;
        self
    }
}

/// Shared application state
pub struct AppContext {
    store: Arc<dyn KeyValueStore>,
    favourites_config: FavouritesConfig,
    favourites: OnceCell<Arc<FavouritesRepository>>,
}

impl AppContext {
    /// Open the device store described by `config`
    pub fn open(config: AppConfig) -> Result<Self> {
        let store = KvStore::new(config.kv)?;
        Ok(Self::with_store(Arc::new(store), config.favourites))
    }

    /// Build a context over an existing store
    pub fn with_store(store: Arc<dyn KeyValueStore>, favourites: FavouritesConfig) -> Self {
        Self { store, favourites_config: favourites, favourites: OnceCell::new() }
    }

    /// The favourites repository, loaded on first access
    ///
    /// A degraded first load is logged; the repository is still returned
    /// with an empty list.
    pub async fn favourites(&self) -> Arc<FavouritesRepository> {
        self.favourites
            .get_or_init(|| async {
                let repository =
                    FavouritesRepository::new(self.store.clone(), self.favourites_config.clone());

                let loaded = repository.load().await;
                match &loaded.condition {
                    Some(condition) => warn!(error = %condition, "Favourites started degraded"),
                    None => info!(count = loaded.value.len(), "Favourites ready"),
                }

                Arc::new(repository)
            })
            .await
            .clone()
    }

    /// Whether the favourites repository has been created
    pub fn favourites_initialized(&self) -> bool {
        self.favourites.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::events::{Event, EventKey};

    #[tokio::test]
    async fn test_favourites_created_once() {
        let context = AppContext::with_store(
            Arc::new(KvStore::in_memory().unwrap()),
            FavouritesConfig::default(),
        );
        assert!(!context.favourites_initialized());

        let first = context.favourites().await;
        let second = context.favourites().await;

        assert!(context.favourites_initialized());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_loaded().await);
    }

    #[tokio::test]
    async fn test_favourites_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plie.db").to_string_lossy().to_string();

        let config = AppConfig::default().kv(KvConfig::new(path).flush_every_ms(None));

        {
            let context = AppContext::open(config.clone()).unwrap();
            let favourites = context.favourites().await;
            let _ = favourites.add(Event::new(216, 1, "Mondays Social Outdoor")).await;
        }

        let context = AppContext::open(config).unwrap();
        let favourites = context.favourites().await;
        assert!(favourites.contains(EventKey::new(216, 1)).await);
        assert_eq!(favourites.count().await, 1);
    }

    #[test]
    fn test_config_builder() {
        let config = AppConfig::new("device.db")
            .kv(KvConfig::new("other.db").use_compression(false))
            .favourites(FavouritesConfig::new().storage_key("favs"));

        assert_eq!(config.kv.path, "other.db");
        assert!(!config.kv.use_compression);
        assert_eq!(config.favourites.storage_key, "favs");
    }
}
