//! Versioned blob encoding
//!
//! This module wraps persisted values in a small envelope carrying a schema
//! version and a checksum, so that stored data can evolve and corruption can
//! be detected on read.
//!
//! Data written before versioning existed (a bare JSON value) decodes as
//! version 0.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Persistence error types
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corruption detected
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Blob was written by a newer schema than this build understands
    #[error("Unsupported version: supports up to {supported}, found {found}")]
    UnsupportedVersion {
        /// Newest version this codec can read
        supported: u32,
        /// Version found in the blob
        found: u32,
    },
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Schema version assigned to pre-envelope data
pub const LEGACY_VERSION: u32 = 0;

/// Versioned state container
///
/// The checksum covers the JSON form of `data`, so it is verified against what
/// was stored rather than against a re-encoding of the decoded value.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionedState {
    /// Version number
    version: u32,
    /// Checksum for corruption detection
    checksum: String,
    /// The actual state data
    data: Value,
}

impl VersionedState {
    fn new<T: Serialize>(version: u32, data: &T) -> Result<Self> {
        let data = serde_json::to_value(data)?;
        let checksum = checksum_of(&data);
        Ok(Self { version, checksum, data })
    }

    fn verify_checksum(&self) -> Result<()> {
        let computed = checksum_of(&self.data);

        if computed != self.checksum {
            return Err(PersistenceError::Corruption(format!(
                "Checksum mismatch: expected {}, got {}",
                self.checksum, computed
            )));
        }

        Ok(())
    }
}

fn checksum_of(data: &Value) -> String {
    format!("{:x}", md5::compute(data.to_string()))
}

/// A decoded blob and the schema version it was stored with
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    /// Version found in storage ([`LEGACY_VERSION`] for unversioned data)
    pub version: u32,
    /// Decoded value
    pub data: T,
}

impl<T> Decoded<T> {
    /// Whether the blob predates the current schema and should be rewritten
    pub fn needs_upgrade(&self, current: u32) -> bool {
        self.version < current
    }
}

/// Encoder/decoder for versioned blobs
#[derive(Debug, Clone, Copy)]
pub struct BlobCodec {
    version: u32,
}

impl BlobCodec {
    /// Create a codec writing `version` and reading any version up to it
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    /// Current schema version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Encode a value as a versioned, checksummed UTF-8 JSON blob
    pub fn encode<T: Serialize>(&self, data: &T) -> Result<Vec<u8>> {
        let versioned = VersionedState::new(self.version, data)?;
        Ok(serde_json::to_vec(&versioned)?)
    }

    /// Decode a blob written by [`BlobCodec::encode`] or by a pre-versioning build
    pub fn decode<T>(&self, bytes: &[u8]) -> Result<Decoded<T>>
    where
        T: DeserializeOwned,
    {
        let raw: Value = serde_json::from_slice(bytes)?;

        let is_envelope = raw.as_object().is_some_and(|obj| obj.contains_key("version"));
        if !is_envelope {
            let data: T = serde_json::from_value(raw)?;
            return Ok(Decoded { version: LEGACY_VERSION, data });
        }

        let version = raw
            .get("version")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| PersistenceError::Corruption("Invalid version field".to_string()))?;

        if version > self.version {
            return Err(PersistenceError::UnsupportedVersion {
                supported: self.version,
                found: version,
            });
        }

        let versioned: VersionedState = serde_json::from_value(raw)?;
        versioned.verify_checksum()?;

        let data: T = serde_json::from_value(versioned.data)?;
        Ok(Decoded { version, data })
    }
}
