//! Typed record contracts and typed views over the store.
//!
//! The store itself works on dynamic [`Record`]s. The types here pin each
//! collection to a struct so callers do not have to know, at runtime, whether
//! a collection is list- or singleton-shaped: list entities are reached
//! through [`ListCollection`], singletons through [`SingletonCollection`].
//!
//! ```rust
//! use elev8tion_store::entities::Contact;
//! use elev8tion_store::CollectionStore;
//!
//! let store = CollectionStore::in_memory()?;
//! let ada = store.contacts().create(Contact {
//!     name: "Ada".to_string(),
//!     email: "ada@example.com".to_string(),
//!     ..Contact::default()
//! })?;
//! assert_eq!(store.contacts().get(&ada.id)?.map(|c| c.data.name), Some("Ada".to_string()));
//! # Ok::<(), elev8tion_store::StoreError>(())
//! ```

use std::marker::PhantomData;

use log::warn;
use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::Result;
use crate::record::Record;
use crate::store::CollectionStore;

/// A struct stored in a fixed collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
}

/// Entities kept in a list-shaped collection.
pub trait ListEntity: Entity {}

/// Entities kept in a singleton collection.
pub trait SingletonEntity: Entity + Default {}

/// A list entity together with the fields the store maintains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub tags: Vec<String>,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub source: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deal {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    pub value: f64,
    pub stage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub completed: bool,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub date: String,
    pub hours: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invoice {
    pub invoice_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub status: InvoiceStatus,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expense {
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub vendor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub title: String,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appointment {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub color: String,
}

/// Business identity used on invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub business_name: String,
    pub logo_base64: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub currency: String,
    pub date_format: String,
    pub tax_rate: f64,
    pub invoice_prefix: String,
    pub invoice_number: u64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            business_name: "My Business".to_string(),
            logo_base64: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            currency: "USD".to_string(),
            date_format: "MM/DD/YYYY".to_string(),
            tax_rate: 8.5,
            invoice_prefix: "INV-".to_string(),
            invoice_number: 1001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: String,
    pub sidebar_collapsed: bool,
    pub items_per_page: u32,
    pub default_view: String,
    pub notifications_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "cosmic-dark".to_string(),
            sidebar_collapsed: false,
            items_per_page: 25,
            default_view: "grid".to_string(),
            notifications_enabled: true,
        }
    }
}

impl Entity for Contact {
    const COLLECTION: Collection = Collection::Contacts;
}
impl Entity for Lead {
    const COLLECTION: Collection = Collection::Leads;
}
impl Entity for Deal {
    const COLLECTION: Collection = Collection::Deals;
}
impl Entity for Project {
    const COLLECTION: Collection = Collection::Projects;
}
impl Entity for Task {
    const COLLECTION: Collection = Collection::Tasks;
}
impl Entity for TimeEntry {
    const COLLECTION: Collection = Collection::TimeEntries;
}
impl Entity for Invoice {
    const COLLECTION: Collection = Collection::Invoices;
}
impl Entity for Expense {
    const COLLECTION: Collection = Collection::Expenses;
}
impl Entity for Event {
    const COLLECTION: Collection = Collection::Events;
}
impl Entity for Appointment {
    const COLLECTION: Collection = Collection::Appointments;
}
impl Entity for Document {
    const COLLECTION: Collection = Collection::Documents;
}
impl Entity for Category {
    const COLLECTION: Collection = Collection::Categories;
}
impl Entity for UserProfile {
    const COLLECTION: Collection = Collection::UserProfile;
}
impl Entity for Preferences {
    const COLLECTION: Collection = Collection::Preferences;
}

impl ListEntity for Contact {}
impl ListEntity for Lead {}
impl ListEntity for Deal {}
impl ListEntity for Project {}
impl ListEntity for Task {}
impl ListEntity for TimeEntry {}
impl ListEntity for Invoice {}
impl ListEntity for Expense {}
impl ListEntity for Event {}
impl ListEntity for Appointment {}
impl ListEntity for Document {}
impl ListEntity for Category {}

impl SingletonEntity for UserProfile {}
impl SingletonEntity for Preferences {}

fn encode<T: Serialize>(entity: &T) -> Result<Record> {
    let value = serde_json::to_value(entity)?;
    Record::from_value(value)
        .ok_or_else(|| serde_json::Error::custom("entity must serialize to a JSON object").into())
}

fn decode<T: DeserializeOwned>(collection: Collection, record: Record) -> Option<T> {
    match serde_json::from_value(record.into_value()) {
        Ok(entity) => Some(entity),
        Err(e) => {
            warn!("Skipping {collection} record that does not match its type: {e}");
            None
        }
    }
}

/// Typed access to a list-shaped collection.
pub struct ListCollection<'a, T> {
    store: &'a CollectionStore,
    _entity: PhantomData<T>,
}

impl<'a, T: ListEntity> ListCollection<'a, T> {
    pub fn new(store: &'a CollectionStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Every record that decodes as `T`; the rest are logged and skipped.
    pub fn all(&self) -> Result<Vec<Stored<T>>> {
        Ok(self
            .store
            .list(T::COLLECTION)?
            .into_iter()
            .filter_map(|record| decode(T::COLLECTION, record))
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Stored<T>>> {
        Ok(self
            .store
            .get(T::COLLECTION, id)?
            .and_then(|record| decode(T::COLLECTION, record)))
    }

    pub fn create(&self, entity: T) -> Result<Stored<T>> {
        let record = self.store.create(T::COLLECTION, encode(&entity)?)?;
        Ok(serde_json::from_value(record.into_value())?)
    }

    /// Shallow-merges `patch` into the record with `id`.
    pub fn update(&self, id: &str, patch: Record) -> Result<Option<Stored<T>>> {
        Ok(self
            .store
            .update(T::COLLECTION, id, patch)?
            .and_then(|record| decode(T::COLLECTION, record)))
    }

    /// Overwrites every field of `T` on the record with `id`. Fields the
    /// type does not know about are kept.
    pub fn replace(&self, id: &str, entity: &T) -> Result<Option<Stored<T>>> {
        self.update(id, encode(entity)?)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete(T::COLLECTION, id)
    }

    pub fn count(&self) -> Result<usize> {
        self.store.count(T::COLLECTION)
    }
}

/// Typed access to a singleton collection.
pub struct SingletonCollection<'a, T> {
    store: &'a CollectionStore,
    _entity: PhantomData<T>,
}

impl<'a, T: SingletonEntity> SingletonCollection<'a, T> {
    pub fn new(store: &'a CollectionStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// The stored value, or `T::default()` when it cannot be decoded.
    pub fn get(&self) -> Result<T> {
        Ok(self
            .store
            .get(T::COLLECTION, "")?
            .and_then(|record| decode(T::COLLECTION, record))
            .unwrap_or_default())
    }

    pub fn update(&self, patch: Record) -> Result<T> {
        Ok(self
            .store
            .update(T::COLLECTION, "", patch)?
            .and_then(|record| decode(T::COLLECTION, record))
            .unwrap_or_default())
    }

    pub fn replace(&self, entity: &T) -> Result<T> {
        self.update(encode(entity)?)
    }
}

impl CollectionStore {
    pub fn list_of<T: ListEntity>(&self) -> ListCollection<'_, T> {
        ListCollection::new(self)
    }

    pub fn singleton_of<T: SingletonEntity>(&self) -> SingletonCollection<'_, T> {
        SingletonCollection::new(self)
    }

    pub fn contacts(&self) -> ListCollection<'_, Contact> {
        self.list_of()
    }

    pub fn projects(&self) -> ListCollection<'_, Project> {
        self.list_of()
    }

    pub fn tasks(&self) -> ListCollection<'_, Task> {
        self.list_of()
    }

    pub fn invoices(&self) -> ListCollection<'_, Invoice> {
        self.list_of()
    }

    pub fn user_profile(&self) -> SingletonCollection<'_, UserProfile> {
        self.singleton_of()
    }

    pub fn preferences(&self) -> SingletonCollection<'_, Preferences> {
        self.singleton_of()
    }
}
