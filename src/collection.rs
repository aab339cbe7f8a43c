//! Catalog of the collections the store knows about.
//!
//! The shape of every collection is fixed by its name: most are ordered lists
//! of records, while `user_profile` and `preferences` hold a single record.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::StoreError;

/// Storage key of the schema marker written on first run.
pub const APP_VERSION_KEY: &str = "app_version";

/// Storage key of the timestamp refreshed by initialization and imports.
pub const LAST_BACKUP_KEY: &str = "last_backup";

/// Schema marker written on first run.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

/// Whether a collection stores a list of records or one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    List,
    Singleton,
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionKind::List => write!(f, "list"),
            CollectionKind::Singleton => write!(f, "singleton"),
        }
    }
}

/// Every named bucket of records in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    UserProfile,
    Contacts,
    Leads,
    Deals,
    Projects,
    Tasks,
    TimeEntries,
    Invoices,
    Expenses,
    Events,
    Appointments,
    Documents,
    Categories,
    Preferences,
}

impl Collection {
    /// All collections, in the order they appear in exports.
    pub const ALL: [Collection; 14] = [
        Collection::UserProfile,
        Collection::Contacts,
        Collection::Leads,
        Collection::Deals,
        Collection::Projects,
        Collection::Tasks,
        Collection::TimeEntries,
        Collection::Invoices,
        Collection::Expenses,
        Collection::Events,
        Collection::Appointments,
        Collection::Documents,
        Collection::Categories,
        Collection::Preferences,
    ];

    /// The storage key, which doubles as the export section name.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::UserProfile => "user_profile",
            Collection::Contacts => "contacts",
            Collection::Leads => "leads",
            Collection::Deals => "deals",
            Collection::Projects => "projects",
            Collection::Tasks => "tasks",
            Collection::TimeEntries => "time_entries",
            Collection::Invoices => "invoices",
            Collection::Expenses => "expenses",
            Collection::Events => "events",
            Collection::Appointments => "appointments",
            Collection::Documents => "documents",
            Collection::Categories => "categories",
            Collection::Preferences => "preferences",
        }
    }

    pub fn kind(&self) -> CollectionKind {
        match self {
            Collection::UserProfile | Collection::Preferences => CollectionKind::Singleton,
            _ => CollectionKind::List,
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.kind() == CollectionKind::Singleton
    }

    /// The value a collection holds before anything has been written to it.
    pub fn default_payload(&self) -> JsonValue {
        match self {
            Collection::UserProfile => json!({
                "business_name": "My Business",
                "logo_base64": "",
                "email": "",
                "phone": "",
                "address": "",
                "currency": "USD",
                "date_format": "MM/DD/YYYY",
                "tax_rate": 8.5,
                "invoice_prefix": "INV-",
                "invoice_number": 1001
            }),
            Collection::Preferences => json!({
                "theme": "cosmic-dark",
                "sidebar_collapsed": false,
                "items_per_page": 25,
                "default_view": "grid",
                "notifications_enabled": true
            }),
            _ => JsonValue::Array(Vec::new()),
        }
    }

    /// Whether `value` has the shape this collection stores: an array for
    /// lists, an object for singletons. Array elements are not checked here;
    /// readers skip the ones that are not records.
    pub fn accepts(&self, value: &JsonValue) -> bool {
        match self.kind() {
            CollectionKind::List => value.is_array(),
            CollectionKind::Singleton => value.is_object(),
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|collection| collection.key() == s)
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}
