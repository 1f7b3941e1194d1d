//! A small typed entity for exercising the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skysync_engine::{FieldMapping, Storable};
use skysync_remote::{FieldMap, FieldValue, Record, RecordId, Recordable};
use skysync_storage::StorageModel;

/// A note with a title and a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    id: RecordId,
    title: String,
    body: String,
    change_date: DateTime<Utc>,
}

impl Note {
    /// Creates a note with a fresh id, changed now.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Self::generate_id(),
            title: title.into(),
            body: String::new(),
            change_date: Utc::now(),
        }
    }

    /// Creates a note with a fixed id and change date.
    pub fn dated(id: &str, title: impl Into<String>, change_date: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(id),
            title: title.into(),
            body: String::new(),
            change_date,
        }
    }

    /// Builder-style body setter. Does not bump the change date.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the id.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Sets the title, bumping the change date if it differs.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.replace_tracked(|note| &mut note.title, title.into());
    }

    /// Sets the body, bumping the change date if it differs.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.replace_tracked(|note| &mut note.body, body.into());
    }
}

impl Recordable for Note {
    const RECORD_TYPE: &'static str = "Note";

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            id: record.id().clone(),
            title: record.text("title")?.to_string(),
            body: record.text("body").unwrap_or_default().to_string(),
            change_date: record.timestamp("changeDate")?,
        })
    }

    fn fields(&self) -> FieldMap {
        FieldMap::from([
            ("title".to_string(), FieldValue::from(self.title.as_str())),
            ("body".to_string(), FieldValue::from(self.body.as_str())),
            ("changeDate".to_string(), FieldValue::Timestamp(self.change_date)),
        ])
    }
}

impl Storable for Note {
    type Model = NoteModel;

    fn change_date(&self) -> DateTime<Utc> {
        self.change_date
    }

    fn set_change_date(&mut self, date: DateTime<Utc>) {
        self.change_date = date;
    }

    fn to_model(&self) -> NoteModel {
        NoteModel {
            key: self.id.name().to_string(),
            title: self.title.clone(),
            body: self.body.clone(),
            change_date: self.change_date,
        }
    }

    fn from_model(model: &NoteModel) -> Option<Self> {
        Some(Self {
            id: RecordId::new(model.key.as_str()),
            title: model.title.clone(),
            body: model.body.clone(),
            change_date: model.change_date,
        })
    }
}

/// Cached form of a [`Note`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteModel {
    /// Record id name.
    pub key: String,
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Last change date.
    pub change_date: DateTime<Utc>,
}

impl StorageModel for NoteModel {
    fn key(&self) -> &str {
        &self.key
    }

    fn change_date(&self) -> DateTime<Utc> {
        self.change_date
    }

    fn set_change_date(&mut self, date: DateTime<Utc>) {
        self.change_date = date;
    }
}

/// Field mapping copying title and body in both directions.
pub fn note_mapping() -> FieldMapping<Note, NoteModel> {
    FieldMapping::new(
        |model: &mut NoteModel, note: &Note| {
            model.title = note.title.clone();
            model.body = note.body.clone();
        },
        |note: &mut Note, model: &NoteModel| {
            note.title = model.title.clone();
            note.body = model.body.clone();
        },
    )
}
