//! Key-value store for device-local blobs
//!
//! This module provides the durable key-value contract used by the app
//! ([`KeyValueStore`]) and its sled-backed implementation ([`KvStore`]).
//! Values are opaque bytes; encoding is the caller's concern.

use async_trait::async_trait;
use sled::Db;
use std::sync::Arc;
use thiserror::Error;

/// Key-value store error types
#[derive(Debug, Error)]
pub enum KvError {
    /// Sled database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Invalid key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Backend could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for key-value operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Durable, device-local key-value store
///
/// Every call may suspend on I/O and may fail. Implementations only need to be
/// consistent for a single device and a single process.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove the blob under `key`, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;
}

#[async_trait]
impl<T> KeyValueStore for Arc<T>
where
    T: KeyValueStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        (**self).remove(key).await
    }
}

/// Key-value store configuration
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Database path
    pub path: String,
    /// Cache capacity in bytes
    pub cache_capacity: u64,
    /// Enable compression
    pub use_compression: bool,
    /// Flush interval in milliseconds (None disables background flushing)
    pub flush_every_ms: Option<u64>,
    /// Flush to disk before every `set` returns
    pub flush_on_write: bool,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            path: "plie_kv.db".to_string(),
            cache_capacity: 8 * 1024 * 1024, // 8MB
            use_compression: true,
            flush_every_ms: Some(500),
            flush_on_write: true,
        }
    }
}

impl KvConfig {
    /// Create a new configuration with a custom path
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set cache capacity in bytes
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression
    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    /// Set flush interval in milliseconds
    pub fn flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Flush synchronously after every write
    pub fn flush_on_write(mut self, enabled: bool) -> Self {
        self.flush_on_write = enabled;
        self
    }
}

/// Sled-backed key-value store
pub struct KvStore {
    db: Arc<Db>,
    flush_on_write: bool,
}

impl KvStore {
    /// Open (or create) a key-value store with configuration
    pub fn new(config: KvConfig) -> Result<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .use_compression(config.use_compression)
            .flush_every_ms(config.flush_every_ms)
            .open()?;
        tracing::debug!(path = %config.path, "Opened key-value store");

        Ok(Self { db: Arc::new(db), flush_on_write: config.flush_on_write })
    }

    /// Create an in-memory key-value store (for testing)
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;

        Ok(Self { db: Arc::new(db), flush_on_write: false })
    }

    /// Get the raw bytes stored under a key
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.db.get(key.as_bytes())?.map(|bytes| bytes.to_vec()))
    }

    /// Store raw bytes under a key
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    /// Remove a value by key
    pub fn remove_key(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.db.remove(key.as_bytes())?.is_some())
    }

    /// Check if a key exists
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the number of keys in the store
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for KvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_bytes(key)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.set_bytes(key, &value)?;
        if self.flush_on_write {
            self.db.flush_async().await?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let existed = self.remove_key(key)?;
        if existed && self.flush_on_write {
            self.db.flush_async().await?;
        }
        Ok(existed)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(KvError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_store_creation() {
        let kv = KvStore::in_memory().unwrap();
        assert!(kv.is_empty());
    }

    #[test]
    fn test_set_and_get_bytes() {
        let kv = KvStore::in_memory().unwrap();

        kv.set_bytes("favouriteEvents", b"[]").unwrap();

        let value = kv.get_bytes("favouriteEvents").unwrap();
        assert_eq!(value.as_deref(), Some(&b"[]"[..]));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let kv = KvStore::in_memory().unwrap();
        assert_eq!(kv.get_bytes("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_remove() {
        let kv = KvStore::in_memory().unwrap();

        kv.set_bytes("key", b"value").unwrap();
        assert!(kv.contains("key").unwrap());

        assert!(kv.remove_key("key").unwrap());
        assert!(!kv.contains("key").unwrap());

        // Second removal reports nothing was there
        assert!(!kv.remove_key("key").unwrap());
    }

    #[test]
    fn test_empty_key_rejected() {
        let kv = KvStore::in_memory().unwrap();

        assert!(matches!(kv.set_bytes("", b"x"), Err(KvError::InvalidKey(_))));
        assert!(matches!(kv.get_bytes("  "), Err(KvError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_trait_round_trip() {
        let kv = KvStore::in_memory().unwrap();
        let store: &dyn KeyValueStore = &kv;

        store.set("blob", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("blob").await.unwrap(), Some(vec![1, 2, 3]));

        store.set("blob", vec![4]).await.unwrap();
        assert_eq!(store.get("blob").await.unwrap(), Some(vec![4]));

        assert!(store.remove("blob").await.unwrap());
        assert_eq!(store.get("blob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shared_store_through_arc() {
        let kv = Arc::new(KvStore::in_memory().unwrap());
        let writer: Arc<dyn KeyValueStore> = kv.clone();

        writer.set("shared", b"hello".to_vec()).await.unwrap();

        assert_eq!(kv.get("shared").await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_reopen_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db").to_string_lossy().to_string();

        let config = KvConfig::new(path).flush_every_ms(None);

        {
            let kv = KvStore::new(config.clone()).unwrap();
            kv.set("favouriteEvents", b"[1]".to_vec()).await.unwrap();
        }

        let reopened = KvStore::new(config).unwrap();
        assert_eq!(reopened.get("favouriteEvents").await.unwrap(), Some(b"[1]".to_vec()));
    }

    #[test]
    fn test_config_builder() {
        let config = KvConfig::new("test.db")
            .cache_capacity(32 * 1024 * 1024)
            .use_compression(false)
            .flush_every_ms(Some(1000))
            .flush_on_write(false);

        assert_eq!(config.path, "test.db");
        assert_eq!(config.cache_capacity, 32 * 1024 * 1024);
        assert!(!config.use_compression);
        assert_eq!(config.flush_every_ms, Some(1000));
        assert!(!config.flush_on_write);
    }
}
