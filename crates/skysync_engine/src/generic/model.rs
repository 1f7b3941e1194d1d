//! Storage model for generic entities.

use super::value::DataValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skysync_remote::RecordId;
use skysync_storage::StorageModel;
use std::collections::BTreeMap;

/// Data map of a generic entity.
pub type DataMap = BTreeMap<String, DataValue>;

/// Persisted form of a [`super::GenericEntity`].
///
/// The data map and child ids are kept as JSON blobs so the cache schema
/// does not depend on the entity's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericStorageModel {
    record_id: String,
    creation_date: DateTime<Utc>,
    change_date: DateTime<Utc>,
    stored_data: Vec<u8>,
    stored_children: Vec<u8>,
}

impl GenericStorageModel {
    /// Creates a model, encoding `data` and `children`.
    pub fn new(
        record_id: impl Into<String>,
        creation_date: DateTime<Utc>,
        change_date: DateTime<Utc>,
        data: &DataMap,
        children: &[RecordId],
    ) -> Self {
        let mut model = Self {
            record_id: record_id.into(),
            creation_date,
            change_date,
            stored_data: Vec::new(),
            stored_children: Vec::new(),
        };
        model.set_data(data);
        model.set_children(children);
        model
    }

    /// Returns the creation date.
    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    /// Decodes the data map. An empty blob decodes to an empty map.
    pub fn data(&self) -> serde_json::Result<DataMap> {
        if self.stored_data.is_empty() {
            return Ok(DataMap::new());
        }
        serde_json::from_slice(&self.stored_data)
    }

    /// Decodes the child ids. An empty blob decodes to no children.
    pub fn children(&self) -> serde_json::Result<Vec<RecordId>> {
        if self.stored_children.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<String> = serde_json::from_slice(&self.stored_children)?;
        Ok(names.into_iter().map(RecordId::from).collect())
    }

    /// Replaces the data blob.
    pub fn set_data(&mut self, data: &DataMap) {
        self.stored_data = encode_data(data);
    }

    /// Replaces the children blob.
    pub fn set_children(&mut self, children: &[RecordId]) {
        self.stored_children = encode_children(children);
    }

    /// Returns the raw data blob.
    pub fn stored_data(&self) -> &[u8] {
        &self.stored_data
    }

    /// Returns the raw children blob.
    pub fn stored_children(&self) -> &[u8] {
        &self.stored_children
    }
}

impl StorageModel for GenericStorageModel {
    fn key(&self) -> &str {
        &self.record_id
    }

    fn change_date(&self) -> DateTime<Utc> {
        self.change_date
    }

    fn set_change_date(&mut self, date: DateTime<Utc>) {
        self.change_date = date;
    }
}

// String keys and plain values always encode; non-finite doubles are tagged
// strings.
pub(crate) fn encode_data(data: &DataMap) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    serde_json::to_vec(data).unwrap_or_default()
}

pub(crate) fn encode_children(children: &[RecordId]) -> Vec<u8> {
    if children.is_empty() {
        return Vec::new();
    }
    let names: Vec<&str> = children.iter().map(RecordId::name).collect();
    serde_json::to_vec(&names).unwrap_or_default()
}
