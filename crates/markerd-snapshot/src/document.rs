//! Marker documents and records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field that identifies a record unless configured otherwise.
pub const DEFAULT_ID_FIELD: &str = "id";

/// A single marker: an untyped mapping from field name to JSON value.
///
/// One field (see [`DEFAULT_ID_FIELD`]) identifies the record; everything
/// else is free-form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Set a field, returning the record.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterate over field names.
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// The lookup key for this record's identifier field.
    pub fn key(&self, id_field: &str) -> RecordKey {
        RecordKey::of(self.get(id_field))
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Lookup key derived from a record identifier.
///
/// Strings key by their content and numbers and other values by their JSON
/// text, so `1` and `"1"` name the same record. A missing identifier and a
/// `null` one each get their own key and never collide with the string
/// `"null"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    /// The record has no identifier field.
    Missing,
    /// The identifier is JSON `null`.
    Null,
    Id(String),
}

impl RecordKey {
    fn of(value: Option<&Value>) -> Self {
        match value {
            None => Self::Missing,
            Some(Value::Null) => Self::Null,
            Some(Value::String(s)) => Self::Id(s.clone()),
            Some(other) => Self::Id(other.to_string()),
        }
    }

    /// The identifier text, if the record has a non-null identifier.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::Missing | Self::Null => None,
        }
    }
}

/// The whole marker collection at one instant.
///
/// Record order is the caller's order and carries no meaning for diffing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Vec<Record>);

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a document from raw JSON bytes.
    ///
    /// Anything but a JSON array of objects is rejected.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Serialize with two-space indentation, the on-disk and remote format.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.0
    }
}

impl From<Vec<Record>> for Document {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}

impl FromIterator<Record> for Document {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
