//! Store configuration.
//!
//! ```rust
//! use elev8tion_store::config::{BackendConfig, StoreConfig};
//!
//! let config = StoreConfig::from_json(r#"{"backend": {"type": "memory", "quota_bytes": 4096}}"#)?;
//! assert_eq!(config.backend, BackendConfig::Memory { quota_bytes: Some(4096) });
//! assert_eq!(config.capacity_bytes, 10 * 1024 * 1024);
//!
//! let store = config.open()?;
//! assert_eq!(store.dashboard_stats()?.total_contacts, 0);
//! # Ok::<(), elev8tion_store::StoreError>(())
//! ```

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::collection::DEFAULT_SCHEMA_VERSION;
use crate::error::{Result, StoreError};
use crate::storage::{KeyValueStorage, LmdbStorage, MemoryStorage, DEFAULT_MAP_SIZE};
use crate::store::{CollectionStore, DEFAULT_CAPACITY_BYTES};

/// Which backend the store persists into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory {
        #[serde(default)]
        quota_bytes: Option<usize>,
    },
    /// LMDB environment in the `<path>.lmdb` directory.
    Lmdb {
        path: String,
        #[serde(default = "default_map_size")]
        map_size: usize,
    },
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory { quota_bytes: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    /// Capacity reported by `storage_info`. Not enforced.
    pub capacity_bytes: usize,
    /// Marker written on first run and into exports.
    pub schema_version: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
        }
    }
}

impl StoreConfig {
    /// LMDB-backed configuration with every other setting at its default.
    pub fn lmdb(path: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::Lmdb {
                path: path.into(),
                map_size: DEFAULT_MAP_SIZE,
            },
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version.trim().is_empty() {
            return Err(StoreError::Config("schema_version must not be empty".to_string()));
        }
        if self.capacity_bytes == 0 {
            return Err(StoreError::Config("capacity_bytes must be positive".to_string()));
        }
        if let BackendConfig::Lmdb { path, map_size } = &self.backend {
            if path.trim().is_empty() {
                return Err(StoreError::Config("lmdb path must not be empty".to_string()));
            }
            if *map_size == 0 {
                return Err(StoreError::Config("lmdb map_size must be positive".to_string()));
            }
        }
        Ok(())
    }

    /// Builds the configured backend and opens a store over it.
    pub fn open(&self) -> Result<CollectionStore> {
        self.validate()?;

        let storage: Box<dyn KeyValueStorage> = match &self.backend {
            BackendConfig::Memory { quota_bytes: None } => Box::new(MemoryStorage::new()),
            BackendConfig::Memory {
                quota_bytes: Some(quota),
            } => Box::new(MemoryStorage::with_quota(*quota)),
            BackendConfig::Lmdb { path, map_size } => Box::new(LmdbStorage::open(path, *map_size)?),
        };
        info!("Opening store with {} backend", storage.backend_name());

        CollectionStore::with_options(storage, self.capacity_bytes, self.schema_version.clone())
    }
}
