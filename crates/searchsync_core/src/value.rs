//! Record and document value model.
//!
//! Source records and backend documents are both JSON objects. Key order is
//! preserved, so a projected document lists its fields in the order the
//! source returned them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A raw record as returned by the record source.
pub type Record = Map<String, Value>;

/// A document ready to be written to the search backend.
pub type Document = Map<String, Value>;

/// Primary key of a source record.
///
/// Keys are either integers or strings. Two ids denote the same record when
/// their canonical string forms match, so `1` and `"1"` are interchangeable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Integer primary key.
    Int(i64),
    /// String primary key (UUIDs, slugs, ...).
    Str(String),
}

impl RecordId {
    /// Reads a record id out of a JSON value.
    ///
    /// Returns `None` for values that cannot act as a primary key
    /// (null, floats with a fractional part, booleans, structures).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Str(s.clone())),
            _ => None,
        }
    }

    /// Converts the id into the JSON value stored in a document.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Str(s) => Value::String(s.clone()),
        }
    }

    /// Canonical string form used for comparisons and backend paths.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Str(s) => f.write_str(s),
        }
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RecordId {}

impl std::hash::Hash for RecordId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Str(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Str(value)
    }
}
