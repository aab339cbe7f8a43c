//! # ELEV8TION Store
//!
//! Local-first data layer for the ELEV8TION business suite: contacts, leads,
//! deals, projects, tasks, time entries, invoices, expenses, events,
//! appointments, documents, categories, a user profile and preferences.
//!
//! Every collection is persisted as one JSON text value under its own key in a
//! pluggable key-value backend: in memory ([`storage::MemoryStorage`]) or in
//! an LMDB environment on disk ([`storage::LmdbStorage`]).
//!
//! ## Features
//!
//! - **CRUD over named collections** with generated ids and ISO-8601 timestamps
//! - **Search, filter and sort** without touching stored order
//! - **Joins** along informal foreign keys, tolerant of dangling references
//! - **Dashboard statistics** recomputed on every read
//! - **Backup and restore** through a single JSON document
//! - **Typed views** ([`entities`]) over the dynamic records
//! - **FFI surface** returning JSON [`AppResponse`](app_response::AppResponse) envelopes
//!
//! ## Quick Start
//!
//! ```rust
//! use elev8tion_store::{Collection, CollectionStore, Record};
//! use serde_json::json;
//!
//! let store = CollectionStore::in_memory()?;
//!
//! let contact = Record::from_value(json!({"name": "A", "email": "a@x.com"})).unwrap();
//! let created = store.create(Collection::Contacts, contact)?;
//!
//! let id = created.id().unwrap();
//! assert_eq!(store.get(Collection::Contacts, id)?, Some(created.clone()));
//! assert_eq!(store.dashboard_stats()?.total_contacts, 1);
//! # Ok::<(), elev8tion_store::StoreError>(())
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_store`] / [`create_store_from_config`] - open a store
//! - [`store_get_all`], [`store_get`] - reads
//! - [`store_create`], [`store_update`], [`store_save`] - writes
//! - [`store_delete`], [`store_delete_many`] - removal
//! - [`store_search`], [`store_sort`] - queries
//! - [`store_dashboard_stats`], [`store_storage_info`] - reports
//! - [`store_export`], [`store_import`], [`store_clear_all`] - backup and reset
//! - [`close_store`], [`free_response`] - cleanup

pub mod app_response;
pub mod collection;
pub mod config;
pub mod entities;
pub mod error;
pub mod queries;
pub mod record;
pub mod storage;
pub mod store;

pub use crate::collection::{Collection, CollectionKind};
pub use crate::config::{BackendConfig, StoreConfig};
pub use crate::error::{Result, StoreError};
pub use crate::queries::{ContactHistory, DashboardStats, InvoiceWithClient, ProjectWithTasks};
pub use crate::record::{CollectionData, Record};
pub use crate::store::{CollectionStore, SortDirection, StorageInfo};

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};

use crate::app_response::AppResponse;

/// Opens an LMDB-backed store in the `<name>.lmdb` directory.
///
/// # Returns
///
/// A pointer to the store, or null when `name` is null, not UTF-8, or the
/// environment cannot be opened. Release it with [`close_store`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use elev8tion_store::{close_store, create_store};
///
/// let name = CString::new("elev8tion_data").unwrap();
/// let store = create_store(name.as_ptr());
/// assert!(!store.is_null());
/// close_store(store);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(name: *const c_char) -> *mut CollectionStore {
    let name = match c_ptr_to_string(name, "name") {
        Ok(name) => name,
        Err(e) => {
            warn!("create_store rejected its argument: {e}");
            return std::ptr::null_mut();
        }
    };

    open_store_ptr(&StoreConfig::lmdb(name))
}

/// Opens a store from a JSON [`StoreConfig`].
///
/// ```json
/// {"backend": {"type": "lmdb", "path": "elev8tion_data"}, "capacity_bytes": 10485760}
/// ```
///
/// Returns null on a null pointer, malformed JSON, an invalid config, or a
/// backend that fails to open.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store_from_config(config_json: *const c_char) -> *mut CollectionStore {
    let text = match c_ptr_to_string(config_json, "config") {
        Ok(text) => text,
        Err(e) => {
            warn!("create_store_from_config rejected its argument: {e}");
            return std::ptr::null_mut();
        }
    };

    match StoreConfig::from_json(&text) {
        Ok(config) => open_store_ptr(&config),
        Err(e) => {
            warn!("Invalid store config: {e}");
            std::ptr::null_mut()
        }
    }
}

fn open_store_ptr(config: &StoreConfig) -> *mut CollectionStore {
    match config.open() {
        Ok(store) => {
            info!("Store opened successfully");
            Box::into_raw(Box::new(store))
        }
        Err(e) => {
            warn!("Failed to open store: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Everything in a collection: a JSON array, or an object for
/// `user_profile` and `preferences`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_get_all(
    state: *mut CollectionStore,
    collection: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_get_all", |store| {
        let collection = collection_arg(collection)?;
        Ok(AppResponse::json(&store.get_all(collection)?))
    })
}

/// One record by id, or `NotFound`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_get(
    state: *mut CollectionStore,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_get", |store| {
        let collection = collection_arg(collection)?;
        let id = c_ptr_to_string(id, "id")?;
        match store.get(collection, &id)? {
            Some(record) => Ok(AppResponse::json(&record)),
            None => Ok(AppResponse::NotFound(format!("No record found with id: {id}"))),
        }
    })
}

/// Creates a record from a JSON object and returns it with its id and
/// timestamps.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_create(
    state: *mut CollectionStore,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_create", |store| {
        let collection = collection_arg(collection)?;
        let data = record_arg(json_ptr)?;
        Ok(AppResponse::json(&store.create(collection, data)?))
    })
}

/// Shallow-merges a JSON object into the record with `id`. `NotFound` when
/// the record does not exist; nothing is created.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_update(
    state: *mut CollectionStore,
    collection: *const c_char,
    id: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_update", |store| {
        let collection = collection_arg(collection)?;
        let id = c_ptr_to_string(id, "id")?;
        let patch = record_arg(json_ptr)?;
        match store.update(collection, &id, patch)? {
            Some(record) => Ok(AppResponse::json(&record)),
            None => Ok(AppResponse::NotFound("Record not found for update".to_string())),
        }
    })
}

/// Updates the record named by the object's `id`, or creates it.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_save(
    state: *mut CollectionStore,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_save", |store| {
        let collection = collection_arg(collection)?;
        let data = record_arg(json_ptr)?;
        Ok(AppResponse::json(&store.save(collection, data)?))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_delete(
    state: *mut CollectionStore,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_delete", |store| {
        let collection = collection_arg(collection)?;
        let id = c_ptr_to_string(id, "id")?;
        if store.delete(collection, &id)? {
            Ok(AppResponse::success("Record deleted successfully"))
        } else {
            Ok(AppResponse::NotFound(format!("No record found with id: {id}")))
        }
    })
}

/// Deletes every record whose id is in a JSON array of strings. Succeeds for
/// any list collection, even when no id matched.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_delete_many(
    state: *mut CollectionStore,
    collection: *const c_char,
    ids_json: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_delete_many", |store| {
        let collection = collection_arg(collection)?;
        let ids: Vec<String> = serde_json::from_str(&c_ptr_to_string(ids_json, "ids")?)?;
        if store.delete_many(collection, &ids)? {
            Ok(AppResponse::success("Records deleted successfully"))
        } else {
            Ok(AppResponse::ValidationError(format!(
                "Cannot delete from singleton collection {collection}"
            )))
        }
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_search(
    state: *mut CollectionStore,
    collection: *const c_char,
    query: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_search", |store| {
        let collection = collection_arg(collection)?;
        let query = c_ptr_to_string(query, "query")?;
        Ok(AppResponse::json(&store.search(collection, &query)?))
    })
}

/// Sorted copy of a collection; `direction` is `"asc"` or `"desc"`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_sort(
    state: *mut CollectionStore,
    collection: *const c_char,
    field: *const c_char,
    direction: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_sort", |store| {
        let collection = collection_arg(collection)?;
        let field = c_ptr_to_string(field, "field")?;
        let direction: SortDirection = c_ptr_to_string(direction, "direction")?
            .parse()
            .unwrap_or_default();
        Ok(AppResponse::json(&store.sort(collection, &field, direction)?))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_dashboard_stats(state: *mut CollectionStore) -> *const c_char {
    ffi_call(state, "store_dashboard_stats", |store| {
        Ok(AppResponse::json(&store.dashboard_stats()?))
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_storage_info(state: *mut CollectionStore) -> *const c_char {
    ffi_call(state, "store_storage_info", |store| Ok(AppResponse::json(&store.storage_info()?)))
}

/// The backup document, wrapped in an `Ok` envelope as a string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_export(state: *mut CollectionStore) -> *const c_char {
    ffi_call(state, "store_export", |store| Ok(AppResponse::Ok(store.export_all()?)))
}

/// Restores a backup document. `ValidationError` when it does not parse or
/// lacks the schema marker.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_import(
    state: *mut CollectionStore,
    payload: *const c_char,
) -> *const c_char {
    ffi_call(state, "store_import", |store| {
        let payload = c_ptr_to_string(payload, "payload")?;
        if store.import_all(&payload)? {
            Ok(AppResponse::success("Backup imported successfully"))
        } else {
            Ok(AppResponse::ValidationError("Invalid backup file".to_string()))
        }
    })
}

/// Removes every collection and restores first-run defaults.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn store_clear_all(state: *mut CollectionStore) -> *const c_char {
    ffi_call(state, "store_clear_all", |store| {
        store.clear_all()?;
        Ok(AppResponse::success("All collections cleared successfully"))
    })
}

/// Releases a store returned by [`create_store`] or
/// [`create_store_from_config`]. The pointer must not be used afterwards.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut CollectionStore) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_store".to_string());
        return response_to_c_string(&error);
    }

    drop(unsafe { Box::from_raw(state) });
    response_to_c_string(&AppResponse::success("Store closed successfully"))
}

/// Frees a response string returned by any of the functions above.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(response: *const c_char) {
    if response.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(response as *mut c_char) });
}

/// Runs `operation` against the store behind `state` and encodes the outcome.
fn ffi_call<F>(state: *mut CollectionStore, name: &str, operation: F) -> *const c_char
where
    F: FnOnce(&CollectionStore) -> std::result::Result<AppResponse, AppResponse>,
{
    let store = match unsafe { state.as_ref() } {
        Some(store) => store,
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {name}"));
            return response_to_c_string(&error);
        }
    };

    let response = operation(store).unwrap_or_else(|error| error);
    response_to_c_string(&response)
}

/// Serializes `response` into a heap C string owned by the caller.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

fn c_ptr_to_string(
    ptr: *const c_char,
    field_name: &str,
) -> std::result::Result<String, AppResponse> {
    if ptr.is_null() {
        return Err(AppResponse::BadRequest(format!("Null {field_name} pointer")));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => Err(AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"))),
    }
}

fn collection_arg(ptr: *const c_char) -> std::result::Result<Collection, AppResponse> {
    let name = c_ptr_to_string(ptr, "collection")?;
    Ok(name.parse::<Collection>()?)
}

fn record_arg(ptr: *const c_char) -> std::result::Result<Record, AppResponse> {
    let value: serde_json::Value = serde_json::from_str(&c_ptr_to_string(ptr, "JSON")?)
        .map_err(|e| AppResponse::SerializationError(format!("Invalid JSON: {e}")))?;
    Record::from_value(value)
        .ok_or_else(|| AppResponse::BadRequest("Expected a JSON object".to_string()))
}
