//! The local collection store.
//!
//! [`CollectionStore`] performs CRUD, search, sorting and backup/restore over
//! named collections. Each collection is one JSON text value in an injected
//! [`KeyValueStorage`]; every mutation reads the whole collection, changes it
//! and writes it back.
//!
//! # Failure model
//!
//! - A stored value that does not parse, or that has the wrong shape for its
//!   collection, is logged and read as the empty/default value. Inside a
//!   list, only the entries that are not objects are skipped.
//! - Point lookups that miss return `None` / `false`.
//! - Only backend failures (LMDB errors, exhausted quota) come back as `Err`.
//!
//! # Concurrency
//!
//! One active writer is assumed. Two writers interleaving on the same backend
//! (another process sharing the LMDB directory, for instance) will silently
//! overwrite each other's changes to a collection: the last full write wins.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::str::FromStr;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::collection::{
    Collection, CollectionKind, APP_VERSION_KEY, DEFAULT_SCHEMA_VERSION, LAST_BACKUP_KEY,
};
use crate::error::{Result, StoreError};
use crate::record::{
    compare_values, display_text, generate_id, is_truthy, now_iso, CollectionData, Record, ID_FIELD,
};
use crate::storage::{KeyValueStorage, MemoryStorage};

/// Capacity reported by [`CollectionStore::storage_info`] unless configured: 10 MiB.
pub const DEFAULT_CAPACITY_BYTES: usize = 10 * 1024 * 1024;

/// Export document field holding the schema marker.
pub const SCHEMA_VERSION_FIELD: &str = "schema_version";

/// Export document field holding the export time.
pub const EXPORTED_AT_FIELD: &str = "exported_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = Infallible;

    /// `"desc"` (any case) sorts descending; anything else ascending.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("desc") || s.trim().eq_ignore_ascii_case("descending") {
            Ok(SortDirection::Desc)
        } else {
            Ok(SortDirection::Asc)
        }
    }
}

/// Estimated storage usage. Sizes are UTF-8 bytes of the stored text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageInfo {
    pub total_bytes: usize,
    pub total_kb: u64,
    pub total_mb: f64,
    pub breakdown: BTreeMap<String, usize>,
    pub limit_mb: f64,
    pub usage_percent: u64,
}

pub struct CollectionStore {
    storage: Box<dyn KeyValueStorage>,
    capacity_bytes: usize,
    schema_version: String,
}

impl CollectionStore {
    /// Opens a store over `storage` with the default capacity and schema
    /// marker, initializing it on first run.
    pub fn open(storage: impl KeyValueStorage + 'static) -> Result<Self> {
        Self::with_options(
            Box::new(storage),
            DEFAULT_CAPACITY_BYTES,
            DEFAULT_SCHEMA_VERSION.to_string(),
        )
    }

    /// Opens a store backed by a fresh [`MemoryStorage`].
    pub fn in_memory() -> Result<Self> {
        Self::open(MemoryStorage::new())
    }

    pub fn with_options(
        storage: Box<dyn KeyValueStorage>,
        capacity_bytes: usize,
        schema_version: String,
    ) -> Result<Self> {
        let store = Self {
            storage,
            capacity_bytes,
            schema_version,
        };
        store.initialize()?;
        info!(
            "Collection store ready on {} backend (schema {})",
            store.storage.backend_name(),
            store.schema_version
        );
        Ok(store)
    }

    pub fn storage(&self) -> &dyn KeyValueStorage {
        self.storage.as_ref()
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// First-run setup: writes the schema marker, the backup timestamp and a
    /// default value for every collection that has none. A no-op once the
    /// marker exists.
    pub fn initialize(&self) -> Result<()> {
        if self.storage.get_item(APP_VERSION_KEY)?.is_some() {
            return Ok(());
        }

        info!("First run, initializing collections");
        self.storage.set_item(APP_VERSION_KEY, &self.schema_version)?;
        self.storage.set_item(LAST_BACKUP_KEY, &now_iso())?;

        for collection in Collection::ALL {
            if self.storage.get_item(collection.key())?.is_none() {
                self.write_value(collection, &collection.default_payload())?;
            }
        }
        Ok(())
    }

    /// The schema marker currently stored, if any.
    pub fn stored_schema_version(&self) -> Result<Option<String>> {
        self.storage.get_item(APP_VERSION_KEY)
    }

    pub fn last_backup(&self) -> Result<Option<String>> {
        self.storage.get_item(LAST_BACKUP_KEY)
    }

    // ============================================
    // CORE CRUD
    // ============================================

    /// Everything in `collection`. Absent or unreadable values yield the
    /// collection's default; list entries that are not objects are skipped.
    pub fn get_all(&self, collection: Collection) -> Result<CollectionData> {
        let value = match self.storage.get_item(collection.key())? {
            None => collection.default_payload(),
            Some(text) => match serde_json::from_str::<JsonValue>(&text) {
                Ok(value) if collection.accepts(&value) => value,
                Ok(_) => {
                    error!(
                        "Stored value of '{collection}' is not {}-shaped, using default",
                        collection.kind()
                    );
                    collection.default_payload()
                }
                Err(e) => {
                    error!("Error reading all {collection}: {e}");
                    collection.default_payload()
                }
            },
        };

        Ok(match (collection.kind(), value) {
            (CollectionKind::List, JsonValue::Array(items)) => {
                let total = items.len();
                let records: Vec<Record> =
                    items.into_iter().filter_map(Record::from_value).collect();
                if records.len() < total {
                    warn!(
                        "Skipping {} non-record entries in '{collection}'",
                        total - records.len()
                    );
                }
                CollectionData::List(records)
            }
            (CollectionKind::Singleton, JsonValue::Object(map)) => {
                CollectionData::Singleton(Record::from(map))
            }
            (CollectionKind::List, _) => CollectionData::List(Vec::new()),
            (CollectionKind::Singleton, _) => CollectionData::Singleton(Record::new()),
        })
    }

    /// The records of a list collection (empty for singletons).
    pub fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        Ok(self.get_all(collection)?.into_list())
    }

    /// Looks a record up by id. Singleton collections return their record
    /// whatever `id` is.
    pub fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        Ok(match self.get_all(collection)? {
            CollectionData::Singleton(record) => Some(record),
            CollectionData::List(records) => {
                records.into_iter().find(|record| record.id() == Some(id))
            }
        })
    }

    /// Appends `data` to a list collection, generating an id when it has none
    /// and stamping both timestamps.
    pub fn create(&self, collection: Collection, mut data: Record) -> Result<Record> {
        let mut records = self.list_for_write(collection)?;

        if data.id().is_none() {
            data.insert(ID_FIELD, generate_id());
        }
        data.stamp_created(&now_iso());

        records.push(data.clone());
        self.write_list(collection, &records)?;
        debug!("Created {collection}:{}", data.id().unwrap_or_default());
        Ok(data)
    }

    /// Shallow-merges `patch` into the record and refreshes `updated_at`.
    ///
    /// Singleton collections merge into their record and ignore `id`. A list
    /// record that does not exist is not created; `None` is returned instead.
    pub fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<Option<Record>> {
        match self.get_all(collection)? {
            CollectionData::Singleton(mut record) => {
                record.merge(patch);
                record.touch(&now_iso());
                self.write_value(collection, &record)?;
                Ok(Some(record))
            }
            CollectionData::List(mut records) => {
                let Some(index) = records.iter().position(|record| record.id() == Some(id)) else {
                    warn!("Item {id} not found in {collection}");
                    return Ok(None);
                };

                let record = &mut records[index];
                record.merge(patch);
                record.touch(&now_iso());
                let updated = record.clone();

                self.write_list(collection, &records)?;
                Ok(Some(updated))
            }
        }
    }

    /// Updates the record named by `data.id` when it exists, otherwise
    /// creates `data`.
    pub fn save(&self, collection: Collection, data: Record) -> Result<Record> {
        if collection.is_singleton() {
            let updated = self.update(collection, "", data)?;
            return Ok(updated.unwrap_or_default());
        }

        if let Some(id) = data.id().map(str::to_owned) {
            if let Some(updated) = self.update(collection, &id, data.clone())? {
                return Ok(updated);
            }
        }
        self.create(collection, data)
    }

    /// Removes the record with `id`. Returns `false` when nothing matched.
    pub fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let Some(mut records) = self.list_or_warn(collection, "delete")? else {
            return Ok(false);
        };

        let before = records.len();
        records.retain(|record| record.id() != Some(id));

        if records.len() == before {
            warn!("Item {id} not found in {collection}");
            return Ok(false);
        }

        self.write_list(collection, &records)?;
        Ok(true)
    }

    /// Removes every record whose id is in `ids`.
    ///
    /// Returns `true` for any list collection, even when nothing matched.
    /// Unlike [`delete`](Self::delete), a miss is not reported.
    pub fn delete_many<I, S>(&self, collection: Collection, ids: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(mut records) = self.list_or_warn(collection, "delete_many")? else {
            return Ok(false);
        };

        let ids: Vec<S> = ids.into_iter().collect();
        let before = records.len();
        records.retain(|record| match record.id() {
            Some(id) => !ids.iter().any(|candidate| candidate.as_ref() == id),
            None => true,
        });
        debug!("Deleted {} of {} requested from {collection}", before - records.len(), ids.len());

        self.write_list(collection, &records)?;
        Ok(true)
    }

    // ============================================
    // SEARCH, FILTER, SORT
    // ============================================

    /// Records with any string field (or string array element) containing
    /// `query`, ignoring case. An empty query matches nothing.
    pub fn search(&self, collection: Collection, query: &str) -> Result<Vec<Record>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.filter(collection, |record| record.matches_query(query))
    }

    /// Records matching every non-empty criterion: the field must be truthy
    /// and its text (see [`display_text`]) must contain the criterion,
    /// ignoring case.
    pub fn search_fields(
        &self,
        collection: Collection,
        criteria: &BTreeMap<String, String>,
    ) -> Result<Vec<Record>> {
        let criteria: Vec<(&str, String)> = criteria
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(field, text)| (field.as_str(), text.to_lowercase()))
            .collect();

        self.filter(collection, |record| {
            criteria.iter().all(|(field, text)| match record.get(field) {
                Some(value) if is_truthy(value) => {
                    display_text(value).to_lowercase().contains(text.as_str())
                }
                _ => false,
            })
        })
    }

    pub fn filter<F>(&self, collection: Collection, predicate: F) -> Result<Vec<Record>>
    where
        F: Fn(&Record) -> bool,
    {
        Ok(self.list(collection)?.into_iter().filter(|record| predicate(record)).collect())
    }

    /// A sorted copy of the collection. Stored order is never changed; ties
    /// keep their stored order.
    pub fn sort(
        &self,
        collection: Collection,
        field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Record>> {
        let mut records = self.list(collection)?;
        records.sort_by(|a, b| {
            let ordering = compare_values(a.get(field), b.get(field));
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        Ok(records)
    }

    pub fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self.get_all(collection)?.len())
    }

    pub fn exists(&self, collection: Collection, id: &str) -> Result<bool> {
        Ok(self.get(collection, id)?.is_some())
    }

    // ============================================
    // BACKUP & RESTORE
    // ============================================

    /// Pretty JSON snapshot of every collection plus the schema marker and
    /// the export time.
    pub fn export_all(&self) -> Result<String> {
        let mut document = Map::new();
        let schema_version = self
            .stored_schema_version()?
            .unwrap_or_else(|| self.schema_version.clone());
        document.insert(SCHEMA_VERSION_FIELD.to_string(), JsonValue::String(schema_version));
        document.insert(EXPORTED_AT_FIELD.to_string(), JsonValue::String(now_iso()));

        for collection in Collection::ALL {
            document.insert(collection.key().to_string(), self.get_all(collection)?.to_value());
        }

        Ok(serde_json::to_string_pretty(&JsonValue::Object(document))?)
    }

    /// Restores an [`export_all`](Self::export_all) document.
    ///
    /// Returns `false` when `payload` does not parse or has no schema marker.
    /// Sections for known collections overwrite them; absent sections leave
    /// data untouched and unknown keys are ignored. Collections are written
    /// one by one, so a backend failure part way leaves earlier ones applied.
    pub fn import_all(&self, payload: &str) -> Result<bool> {
        match serde_json::from_str::<JsonValue>(payload) {
            Ok(document) => self.import_value(&document),
            Err(e) => {
                error!("Error importing data: {e}");
                Ok(false)
            }
        }
    }

    /// [`import_all`](Self::import_all) over an already parsed document.
    pub fn import_value(&self, document: &JsonValue) -> Result<bool> {
        let Some(sections) = document.as_object() else {
            error!("Error importing data: backup is not a JSON object");
            return Ok(false);
        };

        let marker = sections
            .get(SCHEMA_VERSION_FIELD)
            .or_else(|| sections.get(APP_VERSION_KEY));
        if !marker.map(is_truthy).unwrap_or(false) {
            error!("Error importing data: invalid backup file, no schema marker");
            return Ok(false);
        }

        let mut imported = 0;
        for collection in Collection::ALL {
            let Some(section) = sections
                .get(collection.key())
                .filter(|section| is_truthy(section))
            else {
                continue;
            };
            if !collection.accepts(section) {
                warn!(
                    "Skipping import of '{collection}': section is not {}-shaped",
                    collection.kind()
                );
                continue;
            }
            self.write_value(collection, section)?;
            imported += 1;
        }

        self.storage.set_item(LAST_BACKUP_KEY, &now_iso())?;
        info!("Imported {imported} collections");
        Ok(true)
    }

    /// Removes every collection and bookkeeping key, then re-initializes.
    pub fn clear_all(&self) -> Result<()> {
        for collection in Collection::ALL {
            self.storage.remove_item(collection.key())?;
        }
        self.storage.remove_item(APP_VERSION_KEY)?;
        self.storage.remove_item(LAST_BACKUP_KEY)?;

        info!("Cleared all collections");
        self.initialize()
    }

    /// Size of every collection against the configured capacity. An
    /// estimate; the capacity is not enforced here.
    pub fn storage_info(&self) -> Result<StorageInfo> {
        let mut breakdown = BTreeMap::new();
        let mut total_bytes = 0usize;

        for collection in Collection::ALL {
            let size = self.storage.get_item(collection.key())?.map(|text| text.len()).unwrap_or(0);
            breakdown.insert(collection.key().to_string(), size);
            total_bytes += size;
        }

        let total = total_bytes as f64;
        let capacity = self.capacity_bytes.max(1) as f64;
        Ok(StorageInfo {
            total_bytes,
            total_kb: (total / 1024.0).round() as u64,
            total_mb: (total / 1024.0 / 1024.0 * 100.0).round() / 100.0,
            breakdown,
            limit_mb: self.capacity_bytes as f64 / 1024.0 / 1024.0,
            usage_percent: (total / capacity * 100.0).round() as u64,
        })
    }

    // ============================================
    // PERSISTENCE HELPERS
    // ============================================

    fn list_for_write(&self, collection: Collection) -> Result<Vec<Record>> {
        if collection.is_singleton() {
            return Err(StoreError::ShapeMismatch {
                collection: collection.key(),
                actual: CollectionKind::Singleton,
            });
        }
        self.list(collection)
    }

    fn list_or_warn(&self, collection: Collection, operation: &str) -> Result<Option<Vec<Record>>> {
        if collection.is_singleton() {
            warn!("Cannot {operation} on singleton collection {collection}");
            return Ok(None);
        }
        self.list(collection).map(Some)
    }

    fn write_list(&self, collection: Collection, records: &[Record]) -> Result<()> {
        debug!("Persisting {} records to {collection}", records.len());
        self.write_value(collection, records)
    }

    fn write_value<T: Serialize + ?Sized>(&self, collection: Collection, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.storage.set_item(collection.key(), &text)
    }
}
