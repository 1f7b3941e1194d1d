//! Storage model trait.

use chrono::{DateTime, Utc};

/// A record persisted in a local cache.
///
/// The key is the remote record name of the entity the model mirrors and
/// never changes. The change date is advisory: it decides which side wins a
/// conflict, but it is not a vector clock and clock skew between devices can
/// make it non-monotonic.
pub trait StorageModel: Clone + Send + Sync + 'static {
    /// Returns the unique key.
    fn key(&self) -> &str;

    /// Returns the last change date.
    fn change_date(&self) -> DateTime<Utc>;

    /// Overwrites the change date.
    fn set_change_date(&mut self, date: DateTime<Utc>);
}
