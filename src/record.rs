//! Dynamic record model.
//!
//! A [`Record`] is a JSON object. List records carry `id`, `created_at` and
//! `updated_at`; everything else is domain data whose shape is only known to
//! the caller (or to the typed views in [`crate::entities`]).

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// One persisted entity: a mapping from field name to JSON value.
///
/// ```rust
/// use elev8tion_store::record::Record;
/// use serde_json::json;
///
/// let record = Record::from_value(json!({"id": "c1", "name": "Ada", "tags": ["vip"]})).unwrap();
/// assert_eq!(record.id(), Some("c1"));
/// assert!(record.matches_query("ada"));
/// assert!(record.matches_query("VIP"));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, JsonValue>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }

    /// The record's identifier, if it has a non-empty string `id`.
    pub fn id(&self) -> Option<&str> {
        self.str_field(ID_FIELD).filter(|id| !id.is_empty())
    }

    pub fn created_at(&self) -> Option<&str> {
        self.str_field(CREATED_AT_FIELD)
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.str_field(UPDATED_AT_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(JsonValue::as_str)
    }

    pub fn f64_field(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(JsonValue::as_f64)
    }

    /// JavaScript-style truthiness of a field; missing fields are falsy.
    pub fn is_truthy(&self, field: &str) -> bool {
        self.0.get(field).map(is_truthy).unwrap_or(false)
    }

    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<JsonValue>,
    ) -> Option<JsonValue> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<JsonValue> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stamps both timestamps with `now`.
    pub(crate) fn stamp_created(&mut self, now: &str) {
        self.insert(CREATED_AT_FIELD, now);
        self.insert(UPDATED_AT_FIELD, now);
    }

    pub(crate) fn touch(&mut self, now: &str) {
        self.insert(UPDATED_AT_FIELD, now);
    }

    /// Shallow merge: every top-level field of `patch` replaces the field of
    /// the same name. `id` is never overwritten.
    pub fn merge(&mut self, patch: Record) {
        for (field, value) in patch.0 {
            if field == ID_FIELD {
                continue;
            }
            self.0.insert(field, value);
        }
    }

    /// Case-insensitive substring match of `query` against every string field
    /// and every string element of array fields. Nested objects are skipped.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.0.values().any(|value| match value {
            JsonValue::String(text) => text.to_lowercase().contains(&query),
            JsonValue::Array(items) => items
                .iter()
                .filter_map(JsonValue::as_str)
                .any(|text| text.to_lowercase().contains(&query)),
            _ => false,
        })
    }
}

impl From<Map<String, JsonValue>> for Record {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl From<Record> for JsonValue {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// The contents of a collection, tagged by its shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CollectionData {
    List(Vec<Record>),
    Singleton(Record),
}

impl CollectionData {
    /// The records of a list collection; a singleton yields nothing.
    pub fn into_list(self) -> Vec<Record> {
        match self {
            CollectionData::List(records) => records,
            CollectionData::Singleton(_) => Vec::new(),
        }
    }

    pub fn into_singleton(self) -> Option<Record> {
        match self {
            CollectionData::Singleton(record) => Some(record),
            CollectionData::List(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CollectionData::List(records) => records.len(),
            CollectionData::Singleton(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_value(&self) -> JsonValue {
        match self {
            CollectionData::List(records) => {
                JsonValue::Array(records.iter().cloned().map(Record::into_value).collect())
            }
            CollectionData::Singleton(record) => record.clone().into_value(),
        }
    }
}

/// Random UUID-v4 identifier. Uniqueness is probabilistic; nothing checks it.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time as `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub fn now_iso() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses the date formats records carry: RFC 3339, naive date-times and
/// plain dates. Naive values are read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

/// JavaScript truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(flag) => *flag,
        JsonValue::Number(number) => {
            number.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(true)
        }
        JsonValue::String(text) => !text.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// A value as JavaScript's `String()` renders it: arrays join their
/// elements with `,`, objects become `[object Object]`.
pub fn display_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(flag) => flag.to_string(),
        JsonValue::Number(number) => match number.as_i64() {
            Some(n) => n.to_string(),
            None => number.as_f64().map(|n| n.to_string()).unwrap_or_else(|| number.to_string()),
        },
        JsonValue::String(text) => text.clone(),
        JsonValue::Array(items) => items.iter().map(display_text).collect::<Vec<_>>().join(","),
        JsonValue::Object(_) => "[object Object]".to_string(),
    }
}

/// Total order over optional JSON values used by sorting.
///
/// Values of different types order by type: missing/null, booleans, numbers,
/// strings, arrays, objects. Arrays and objects compare equal to their kind.
pub fn compare_values(left: Option<&JsonValue>, right: Option<&JsonValue>) -> Ordering {
    fn rank(value: Option<&JsonValue>) -> u8 {
        match value {
            None | Some(JsonValue::Null) => 0,
            Some(JsonValue::Bool(_)) => 1,
            Some(JsonValue::Number(_)) => 2,
            Some(JsonValue::String(_)) => 3,
            Some(JsonValue::Array(_)) => 4,
            Some(JsonValue::Object(_)) => 5,
        }
    }

    match (left, right) {
        (Some(JsonValue::Bool(a)), Some(JsonValue::Bool(b))) => a.cmp(b),
        (Some(JsonValue::Number(a)), Some(JsonValue::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(JsonValue::String(a)), Some(JsonValue::String(b))) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}
