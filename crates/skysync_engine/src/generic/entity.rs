//! Generic dynamic-schema entity.

use super::model::{encode_children, encode_data, DataMap, GenericStorageModel};
use super::value::DataValue;
use crate::storable::Storable;
use chrono::{DateTime, Utc};
use skysync_remote::{FieldMap, FieldValue, Record, RecordId, Recordable};
use skysync_storage::StorageModel;

const FIELD_CHANGE_DATE: &str = "changeDate";
const FIELD_CREATED_DATE: &str = "createdDate";
const FIELD_DATA: &str = "data";
const FIELD_CHILDREN: &str = "children";

/// An entity whose fields are a free-form key/value map.
///
/// The data map and child ids travel as JSON blobs in the remote record's
/// `data` and `children` fields. Every mutation that changes content bumps
/// the change date to now.
///
/// # Example
///
/// ```rust
/// use skysync_engine::{DataValue, GenericEntity};
///
/// let mut list = GenericEntity::new();
/// list.insert("title", "groceries");
/// list.insert("done", false);
///
/// assert_eq!(list.string("title"), Some("groceries"));
/// assert!(!list.bool("done", true));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GenericEntity {
    id: RecordId,
    created_date: DateTime<Utc>,
    change_date: DateTime<Utc>,
    data: DataMap,
    children: Vec<RecordId>,
}

impl GenericEntity {
    /// Creates an empty entity with a fresh id.
    pub fn new() -> Self {
        Self::with_id(Self::generate_id())
    }

    /// Creates an empty entity with the given id.
    pub fn with_id(id: RecordId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_date: now,
            change_date: now,
            data: DataMap::new(),
            children: Vec::new(),
        }
    }

    /// Creates an entity from all of its parts.
    pub fn from_parts(
        id: RecordId,
        created_date: DateTime<Utc>,
        change_date: DateTime<Utc>,
        data: DataMap,
        children: Vec<RecordId>,
    ) -> Self {
        Self {
            id,
            created_date,
            change_date,
            data,
            children,
        }
    }

    /// Builder-style data setter. Does not bump the change date.
    #[must_use]
    pub fn with_data(mut self, data: DataMap) -> Self {
        self.data = data;
        self
    }

    /// Builder-style setter for the children of `entities`.
    #[must_use]
    pub fn with_child_entities(mut self, entities: &[GenericEntity]) -> Self {
        self.children = entities.iter().map(|e| e.id.clone()).collect();
        self
    }

    /// Returns the record id.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns the creation date.
    pub fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }

    /// Returns the data map.
    pub fn data(&self) -> &DataMap {
        &self.data
    }

    /// Returns the child ids.
    pub fn children(&self) -> &[RecordId] {
        &self.children
    }

    /// Replaces the data map.
    pub fn set_data(&mut self, data: DataMap) {
        self.replace_tracked(|e| &mut e.data, data);
    }

    /// Replaces the child ids.
    pub fn set_children(&mut self, children: Vec<RecordId>) {
        self.replace_tracked(|e| &mut e.children, children);
    }

    /// Sets one data value. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Option<DataValue> {
        let value = value.into();
        let previous = self.data.insert(key.into(), value.clone());
        if previous.as_ref() != Some(&value) {
            self.set_change_date(Utc::now());
        }
        previous
    }

    /// Removes one data value.
    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        let previous = self.data.remove(key);
        if previous.is_some() {
            self.set_change_date(Utc::now());
        }
        previous
    }

    /// Adds a child id if not already present.
    pub fn add_child(&mut self, id: RecordId) {
        if !self.children.contains(&id) {
            self.children.push(id);
            self.set_change_date(Utc::now());
        }
    }

    /// Removes a child id.
    pub fn remove_child(&mut self, id: &RecordId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != id);
        let removed = self.children.len() != before;
        if removed {
            self.set_change_date(Utc::now());
        }
        removed
    }

    /// Replaces data and children without touching the change date.
    pub(crate) fn replace_contents(&mut self, data: DataMap, children: Vec<RecordId>) {
        self.data = data;
        self.children = children;
    }

    /// Returns a string value.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.data.get(key) {
            Some(DataValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns an integer value.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.data.get(key) {
            Some(DataValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// Returns a double value.
    pub fn double(&self, key: &str) -> Option<f64> {
        match self.data.get(key) {
            Some(DataValue::Double(d)) => Some(*d),
            _ => None,
        }
    }

    /// Returns a date value.
    pub fn date(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.data.get(key) {
            Some(DataValue::Date(t)) => Some(*t),
            _ => None,
        }
    }

    /// Returns a boolean value, or `default` if absent or not a boolean.
    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.data.get(key) {
            Some(DataValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Returns a bytes value.
    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        match self.data.get(key) {
            Some(DataValue::Data(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the first entity in `entities` that lists this one as a child.
    pub fn parent_in<'a>(&self, entities: &'a [GenericEntity]) -> Option<&'a GenericEntity> {
        entities.iter().find(|e| e.children.contains(&self.id))
    }

    /// Returns the entities in `entities` that this one lists as children.
    pub fn children_in<'a>(&self, entities: &'a [GenericEntity]) -> Vec<&'a GenericEntity> {
        entities
            .iter()
            .filter(|e| self.children.contains(&e.id))
            .collect()
    }
}

impl Default for GenericEntity {
    fn default() -> Self {
        Self::new()
    }
}

impl Recordable for GenericEntity {
    const RECORD_TYPE: &'static str = "GenericEntity";

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn from_record(record: &Record) -> Option<Self> {
        let data: DataMap = match record.bytes(FIELD_DATA) {
            Some([]) => DataMap::new(),
            Some(bytes) => serde_json::from_slice(bytes).ok()?,
            None => return None,
        };
        let children = match record.bytes(FIELD_CHILDREN) {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice::<Vec<String>>(bytes)
                .unwrap_or_default()
                .into_iter()
                .map(RecordId::from)
                .collect(),
            _ => Vec::new(),
        };
        let now = Utc::now();

        Some(Self {
            id: record.id().clone(),
            created_date: record.timestamp(FIELD_CREATED_DATE).unwrap_or(now),
            change_date: record.timestamp(FIELD_CHANGE_DATE).unwrap_or(now),
            data,
            children,
        })
    }

    fn fields(&self) -> FieldMap {
        FieldMap::from([
            (FIELD_CHANGE_DATE.to_string(), FieldValue::Timestamp(self.change_date)),
            (FIELD_CREATED_DATE.to_string(), FieldValue::Timestamp(self.created_date)),
            (FIELD_DATA.to_string(), FieldValue::Bytes(encode_data(&self.data))),
            (FIELD_CHILDREN.to_string(), FieldValue::Bytes(encode_children(&self.children))),
        ])
    }
}

impl Storable for GenericEntity {
    type Model = GenericStorageModel;

    fn change_date(&self) -> DateTime<Utc> {
        self.change_date
    }

    fn set_change_date(&mut self, date: DateTime<Utc>) {
        self.change_date = date;
    }

    fn to_model(&self) -> GenericStorageModel {
        GenericStorageModel::new(
            self.id.name(),
            self.created_date,
            self.change_date,
            &self.data,
            &self.children,
        )
    }

    fn from_model(model: &GenericStorageModel) -> Option<Self> {
        Some(Self {
            id: RecordId::new(model.key()),
            created_date: model.creation_date(),
            change_date: model.change_date(),
            data: model.data().ok()?,
            children: model.children().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000, 0).unwrap()
    }

    fn stale_entity() -> GenericEntity {
        GenericEntity::from_parts(RecordId::new("g1"), epoch(), epoch(), DataMap::new(), Vec::new())
    }

    #[test]
    fn content_changes_bump_change_date() {
        let mut entity = stale_entity();
        entity.insert("title", "a");
        assert!(entity.change_date > epoch());

        entity.change_date = epoch();
        entity.insert("title", "a");
        assert_eq!(entity.change_date, epoch());

        entity.remove("missing");
        assert_eq!(entity.change_date, epoch());

        entity.set_data(entity.data().clone());
        assert_eq!(entity.change_date, epoch());

        entity.add_child(RecordId::new("c1"));
        assert!(entity.change_date > epoch());
    }

    #[test]
    fn set_data_bumps_only_on_difference() {
        let mut entity = stale_entity();
        let mut data = DataMap::new();
        data.insert("n".into(), DataValue::from(1i64));
        entity.set_data(data.clone());
        assert!(entity.change_date > epoch());
        assert_eq!(entity.data(), &data);
    }

    #[test]
    fn typed_getters() {
        let mut entity = stale_entity();
        entity.insert("s", "text");
        entity.insert("i", 7i64);
        entity.insert("d", 1.5);
        entity.insert("t", epoch());
        entity.insert("b", true);
        entity.insert("x", vec![9u8]);

        assert_eq!(entity.string("s"), Some("text"));
        assert_eq!(entity.integer("i"), Some(7));
        assert_eq!(entity.double("d"), Some(1.5));
        assert_eq!(entity.date("t"), Some(epoch()));
        assert!(entity.bool("b", false));
        assert!(entity.bool("missing", true));
        assert!(!entity.bool("s", false));
        assert_eq!(entity.bytes("x"), Some(&[9u8][..]));
        assert_eq!(entity.integer("s"), None);
    }

    #[test]
    fn parent_and_children_lookup() {
        let a = GenericEntity::with_id(RecordId::new("a"));
        let b = GenericEntity::with_id(RecordId::new("b"));
        let root = GenericEntity::with_id(RecordId::new("root")).with_child_entities(&[a.clone(), b.clone()]);
        let all = vec![root.clone(), a.clone(), b.clone()];

        assert_eq!(a.parent_in(&all).map(|p| p.id().name()), Some("root"));
        assert!(root.parent_in(&all).is_none());

        let ids: Vec<&str> = root.children_in(&all).iter().map(|c| c.id().name()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn record_round_trip() {
        let mut entity = stale_entity();
        entity.insert("title", "groceries");
        entity.add_child(RecordId::new("c1"));

        let record = entity.new_record();
        assert_eq!(record.record_type(), "GenericEntity");
        assert_eq!(GenericEntity::from_record(&record), Some(entity));
    }

    #[test]
    fn record_without_data_is_rejected() {
        let record = Record::new("GenericEntity", RecordId::new("g1"));
        assert!(GenericEntity::from_record(&record).is_none());

        let record = record.with_field("data", vec![b'{']);
        assert!(GenericEntity::from_record(&record).is_none());
    }

    #[test]
    fn non_finite_values_round_trip() {
        let mut entity = stale_entity();
        entity.insert("ratio", f64::NAN);
        entity.insert("ceiling", f64::INFINITY);

        let from_record = GenericEntity::from_record(&entity.new_record()).unwrap();
        assert!(from_record.double("ratio").unwrap().is_nan());
        assert_eq!(from_record.double("ceiling"), Some(f64::INFINITY));

        let from_model = GenericEntity::from_model(&entity.to_model()).unwrap();
        assert!(from_model.double("ratio").unwrap().is_nan());
        assert_eq!(from_model.change_date(), entity.change_date());
    }

    #[test]
    fn model_round_trip() {
        let mut entity = stale_entity();
        entity.insert("count", 2i64);
        entity.add_child(RecordId::new("c1"));

        let model = entity.to_model();
        assert_eq!(GenericEntity::from_model(&model), Some(entity));
    }
}
