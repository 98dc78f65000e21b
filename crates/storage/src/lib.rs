//! Storage layer for Plie
//!
//! This crate provides the device-local key-value store and the versioned
//! blob encoding used for persisted app data.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod kv;
pub mod persistence;

pub use kv::{KeyValueStore, KvConfig, KvError, KvStore};
#[cfg(feature = "mock")]
pub use kv::MockKeyValueStore;
pub use persistence::{BlobCodec, Decoded, PersistenceError, LEGACY_VERSION};
