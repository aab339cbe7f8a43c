//! Key-value backends the collection store persists into.
//!
//! A backend only needs string get/set/remove, the same contract as browser
//! local storage. [`MemoryStorage`] keeps everything in a map and can enforce
//! a byte quota; [`LmdbStorage`] persists to an LMDB environment on disk.

mod lmdb_storage;
mod memory;

pub use self::lmdb_storage::{LmdbStorage, DEFAULT_MAP_SIZE};
pub use self::memory::MemoryStorage;

use crate::error::Result;

/// String key-value storage.
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`, or `None` when it is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Overwrites the value stored under `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Short name used in log lines.
    fn backend_name(&self) -> &'static str;
}
