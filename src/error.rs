//! Error taxonomy for the collection store.
//!
//! Only backend failures surface as [`StoreError`]. Parse failures of stored
//! values and not-found lookups are handled inside the store and degrade to
//! empty/default results.

use thiserror::Error;

use crate::collection::CollectionKind;

/// Errors that can occur while talking to a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// LMDB environment or transaction failure.
    #[error("database error: {0}")]
    Database(#[from] lmdb::Error),

    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value was not valid UTF-8.
    #[error("invalid UTF-8 in stored value: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Writing `key` would push the backend past its byte quota.
    #[error("quota exceeded writing '{key}': {requested} bytes requested, {capacity} available")]
    QuotaExceeded {
        key: String,
        requested: usize,
        capacity: usize,
    },

    /// The operation does not apply to the collection's shape.
    #[error("collection '{collection}' is {actual}-shaped")]
    ShapeMismatch {
        collection: &'static str,
        actual: CollectionKind,
    },

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// The in-memory backend's lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
