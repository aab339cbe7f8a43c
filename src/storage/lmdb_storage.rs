use std::path::{Path, PathBuf};

use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{info, warn};

use super::KeyValueStorage;
use crate::error::{Result, StoreError};

/// Default LMDB map size: 64 MiB.
pub const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;

/// LMDB-backed storage living in a `<name>.lmdb` directory.
///
/// Every collection is one key in the environment's unnamed database.
/// Each write runs in its own read-write transaction, so a value is either
/// fully replaced or left untouched.
pub struct LmdbStorage {
    env: Environment,
    db: Database,
    path: PathBuf,
    map_size: usize,
}

impl LmdbStorage {
    /// Opens (creating if needed) the environment at `<name>.lmdb`.
    pub fn open(name: &str, map_size: usize) -> Result<Self> {
        let path = PathBuf::from(format!("{name}.lmdb"));

        if path.exists() {
            info!("Opening existing LMDB environment at {}", path.display());
        } else {
            info!("Creating LMDB environment at {}", path.display());
            std::fs::create_dir_all(&path)?;
        }

        let env = Environment::new().set_map_size(map_size).open(&path)?;
        let db = env.create_db(None, DatabaseFlags::empty())?;

        Ok(Self { env, db, path, map_size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn map_size(&self) -> usize {
        self.map_size
    }

    /// Flushes the environment to disk.
    pub fn sync(&self) -> Result<()> {
        self.env.sync(true)?;
        Ok(())
    }

    /// Closes the environment and removes its directory.
    pub fn destroy(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}

impl KeyValueStorage for LmdbStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => Some(std::str::from_utf8(bytes)?.to_owned()),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.put(self.db, &key, &value, WriteFlags::empty()) {
            Ok(()) => {}
            Err(lmdb::Error::MapFull) => {
                warn!("LMDB map full writing '{key}' ({} bytes)", value.len());
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    requested: value.len(),
                    capacity: self.map_size,
                });
            }
            Err(e) => return Err(e.into()),
        }
        match txn.commit() {
            Ok(()) => Ok(()),
            Err(lmdb::Error::MapFull) => Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                requested: value.len(),
                capacity: self.map_size,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.db, &key, None) {
            Ok(()) | Err(lmdb::Error::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        txn.commit()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "lmdb"
    }
}
