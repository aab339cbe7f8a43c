use std::collections::HashMap;
use std::sync::RwLock;

use log::warn;

use super::KeyValueStorage;
use crate::error::{Result, StoreError};

/// In-process storage. Nothing survives the value being dropped.
///
/// With a quota set, a write that would make the sum of key and value bytes
/// exceed it fails with [`StoreError::QuotaExceeded`] and leaves the previous
/// value in place.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn quota_bytes(&self) -> Option<usize> {
        self.quota_bytes
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> Result<usize> {
        let items = self.items.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(items.iter().map(|(k, v)| k.len() + v.len()).sum())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| StoreError::LockPoisoned)?;

        if let Some(quota) = self.quota_bytes {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let requested = key.len() + value.len();
            let available = quota.saturating_sub(used);
            if requested > available {
                warn!("Quota exceeded writing '{key}': {requested} bytes, {available} available");
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    requested,
                    capacity: available,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| StoreError::LockPoisoned)?;
        items.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
