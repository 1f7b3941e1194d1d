//! Remote record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Globally unique name of a remote record.
///
/// Record ids are the join key between remote records and local storage
/// models. They are immutable once assigned.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record id from an existing name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Generates a fresh random record id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().to_uppercase())
    }

    /// Returns the record name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for RecordId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A dynamically typed field value.
///
/// This is the complete set of value kinds a remote record can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Explicitly empty value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Double(f64),
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Reference to another record.
    Reference(RecordId),
    /// Ordered list of values.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a double. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Double(d) => Some(*d),
            FieldValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a timestamp, if it is one.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Get this value as a record reference, if it is one.
    pub fn as_reference(&self) -> Option<&RecordId> {
        match self {
            FieldValue::Reference(id) => Some(id),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns a short name for the value kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::Text(_) => "text",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Reference(_) => "reference",
            FieldValue::List(_) => "list",
        }
    }

    /// Orders two values of comparable kinds.
    ///
    /// Integers and doubles compare numerically with each other. Values of
    /// unrelated kinds are unordered.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Some(Ordering::Equal),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(_) | FieldValue::Double(_), FieldValue::Integer(_) | FieldValue::Double(_)) => {
                self.as_double()?.partial_cmp(&other.as_double()?)
            }
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            (FieldValue::Reference(a), FieldValue::Reference(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<RecordId> for FieldValue {
    fn from(value: RecordId) -> Self {
        FieldValue::Reference(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        FieldValue::List(value)
    }
}

/// Field name to value mapping written onto a record.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A record as stored by the remote store.
///
/// The change tag is the server's version marker. Stores set it on every
/// successful write; a record whose tag is stale is rejected by saves that
/// use [`crate::SavePolicy::IfServerRecordUnchanged`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    record_type: String,
    id: RecordId,
    fields: FieldMap,
    change_tag: Option<String>,
}

impl Record {
    /// Creates an empty record that has never been written.
    pub fn new(record_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            fields: FieldMap::new(),
            change_tag: None,
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the record type.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Returns the record id.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns the server change tag, if the record has been written.
    pub fn change_tag(&self) -> Option<&str> {
        self.change_tag.as_deref()
    }

    /// Sets the server change tag. Called by store implementations.
    pub fn set_change_tag(&mut self, tag: Option<String>) {
        self.change_tag = tag;
    }

    /// Returns every field.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Returns a field value.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Sets a field value, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a field.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Returns a text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Returns an integer field.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_integer)
    }

    /// Returns a double field.
    pub fn double(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_double)
    }

    /// Returns a boolean field.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_bool)
    }

    /// Returns a bytes field.
    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(FieldValue::as_bytes)
    }

    /// Returns a timestamp field.
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(FieldValue::as_timestamp)
    }
}
