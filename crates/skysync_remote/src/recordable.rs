//! Entities that map onto remote records.

use crate::record::{FieldMap, Record, RecordId};

/// A domain type that can be written to and rebuilt from a remote record.
///
/// Implementations list their fields explicitly in [`Recordable::fields`].
/// Only the listed fields are written; everything else on the record is left
/// as the server has it.
///
/// # Example
///
/// ```rust
/// use skysync_remote::{FieldMap, Record, RecordId, Recordable};
///
/// #[derive(Clone)]
/// struct Tag {
///     id: RecordId,
///     label: String,
/// }
///
/// impl Recordable for Tag {
///     const RECORD_TYPE: &'static str = "Tag";
///
///     fn record_id(&self) -> &RecordId {
///         &self.id
///     }
///
///     fn from_record(record: &Record) -> Option<Self> {
///         Some(Self {
///             id: record.id().clone(),
///             label: record.text("label")?.to_string(),
///         })
///     }
///
///     fn fields(&self) -> FieldMap {
///         FieldMap::from([("label".to_string(), self.label.clone().into())])
///     }
/// }
///
/// let tag = Tag { id: Tag::generate_id(), label: "home".into() };
/// assert_eq!(tag.new_record().text("label"), Some("home"));
/// ```
pub trait Recordable: Clone + Send + Sync + 'static {
    /// Remote record type name.
    const RECORD_TYPE: &'static str;

    /// Returns the entity's record id.
    fn record_id(&self) -> &RecordId;

    /// Rebuilds an entity, or `None` if the record is missing required fields.
    fn from_record(record: &Record) -> Option<Self>;

    /// The field values written to the remote record.
    fn fields(&self) -> FieldMap;

    /// Generates an id for a new entity.
    fn generate_id() -> RecordId {
        RecordId::generate()
    }

    /// Creates a record that has never been written, holding this entity's
    /// fields.
    fn new_record(&self) -> Record {
        let mut record = Record::new(Self::RECORD_TYPE, self.record_id().clone());
        self.apply_to(&mut record);
        record
    }

    /// Copies this entity's fields onto an existing record.
    fn apply_to(&self, record: &mut Record) {
        for (name, value) in self.fields() {
            record.set(name, value);
        }
    }
}
