//! Dynamic field values and write-time transforms.
//!
//! Documents are schemaless maps of field name to [`Value`]. Writes use
//! [`FieldWrite`], which carries the transforms the platform resolves at
//! apply time: server timestamps, array union/remove and counter
//! increments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A field value as stored in a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        match s {
            Some(s) => Self::Str(s),
            None => Self::Null,
        }
    }
}

impl From<Option<i64>> for Value {
    fn from(n: Option<i64>) -> Self {
        match n {
            Some(n) => Self::Int(n),
            None => Self::Null,
        }
    }
}

/// A single field mutation inside a merge write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FieldWrite {
    /// Overwrite the field with the given value.
    Set(Value),
    /// Resolve to the server's clock when the write is applied.
    ServerTime,
    /// Append each element that is not already present.
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of each element.
    ArrayRemove(Vec<Value>),
    /// Add to the current integer value (missing or mistyped counts as 0).
    Increment(i64),
    /// Remove the field from the document.
    Delete,
}

impl FieldWrite {
    /// Resolve this write against the field's current value.
    ///
    /// Returns `None` when the field should be removed. `now` is the
    /// server clock used for [`FieldWrite::ServerTime`].
    pub fn apply(&self, current: Option<&Value>, now: DateTime<Utc>) -> Option<Value> {
        match self {
            Self::Set(v) => Some(v.clone()),
            Self::ServerTime => Some(Value::Timestamp(now)),
            Self::ArrayUnion(items) => {
                let mut arr = match current {
                    Some(Value::Array(existing)) => existing.clone(),
                    _ => Vec::new(),
                };
                for item in items {
                    if !arr.contains(item) {
                        arr.push(item.clone());
                    }
                }
                Some(Value::Array(arr))
            }
            Self::ArrayRemove(items) => {
                let arr = match current {
                    Some(Value::Array(existing)) => existing
                        .iter()
                        .filter(|v| !items.contains(v))
                        .cloned()
                        .collect(),
                    _ => Vec::new(),
                };
                Some(Value::Array(arr))
            }
            Self::Increment(delta) => {
                let base = current.and_then(Value::as_i64).unwrap_or(0);
                Some(Value::Int(base + delta))
            }
            Self::Delete => None,
        }
    }
}

/// Stored fields of one document.
pub type Fields = BTreeMap<String, Value>;

/// Fields of one merge write.
pub type WriteFields = BTreeMap<String, FieldWrite>;

/// A document snapshot: its id plus the stored fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Resolve a whole merge write against existing fields.
pub fn apply_writes(existing: &mut Fields, writes: &WriteFields, now: DateTime<Utc>) {
    for (name, write) in writes {
        match write.apply(existing.get(name), now) {
            Some(v) => {
                existing.insert(name.clone(), v);
            }
            None => {
                existing.remove(name);
            }
        }
    }
}
