//! On-disk encoding of the favourites list

use storage::{BlobCodec, PersistenceError};

use super::{FavouriteEntry, FavouritesCollection};

/// Schema version written for the favourites list
///
/// Version 0 is the pre-versioning bare JSON array; it is still readable.
pub const SCHEMA_VERSION: u32 = 1;

/// A favourites list read back from storage
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFavourites {
    /// Duplicate-free collection
    pub collection: FavouritesCollection,
    /// Schema version the blob was written with
    pub version: u32,
    /// Number of duplicate entries dropped while decoding
    pub dropped_duplicates: usize,
}

impl DecodedFavourites {
    /// Whether the blob should be rewritten in the current schema
    pub fn needs_upgrade(&self) -> bool {
        self.version < SCHEMA_VERSION || self.dropped_duplicates > 0
    }
}

/// Encode the list in the current schema
pub fn encode(collection: &FavouritesCollection) -> Result<Vec<u8>, PersistenceError> {
    BlobCodec::new(SCHEMA_VERSION).encode(collection)
}

/// Decode a stored list, accepting the unversioned legacy array
pub fn decode(bytes: &[u8]) -> Result<DecodedFavourites, PersistenceError> {
    let decoded = BlobCodec::new(SCHEMA_VERSION).decode::<Vec<FavouriteEntry>>(bytes)?;
    let (collection, dropped_duplicates) = FavouritesCollection::from_entries(decoded.data);

    Ok(DecodedFavourites { collection, version: decoded.version, dropped_duplicates })
}
