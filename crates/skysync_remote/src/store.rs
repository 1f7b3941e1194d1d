//! The remote store contract.

use crate::error::StoreResult;
use crate::predicate::Query;
use crate::record::{Record, RecordId};
use async_trait::async_trait;
use std::fmt;

/// Opaque continuation token for a paginated query.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a store-specific token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({})", self.0)
    }
}

/// One page of query results.
///
/// Each result is reported individually; a store may fail to materialize a
/// single record while returning the rest of the page.
#[derive(Debug, Clone)]
pub struct QueryPage {
    /// Results in server order.
    pub results: Vec<(RecordId, StoreResult<Record>)>,
    /// Continuation for the next page, if any.
    pub cursor: Option<Cursor>,
}

/// How a batched write treats records changed on the server since they were
/// fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Fail the item with `ServerRecordChanged` if the change tag is stale.
    #[default]
    IfServerRecordUnchanged,
    /// Write unconditionally.
    Overwrite,
}

/// Per-record outcome of [`RemoteStore::modify_records`].
#[derive(Debug, Clone, Default)]
pub struct ModifyOutcome {
    /// Save results, keyed by the record that was submitted.
    pub saved: Vec<(RecordId, StoreResult<Record>)>,
    /// Delete results.
    pub deleted: Vec<(RecordId, StoreResult<()>)>,
}

/// An asynchronous remote record database.
///
/// Every call may suspend on the network and may fail. Implementations
/// assign a fresh change tag to every record they write.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches one record.
    async fn fetch_record(&self, id: &RecordId) -> StoreResult<Record>;

    /// Fetches several records, reporting each individually.
    async fn fetch_records(
        &self,
        ids: &[RecordId],
    ) -> StoreResult<Vec<(RecordId, StoreResult<Record>)>>;

    /// Writes one record and returns the stored copy.
    async fn save_record(&self, record: Record) -> StoreResult<Record>;

    /// Deletes one record.
    async fn delete_record(&self, id: &RecordId) -> StoreResult<()>;

    /// Saves and deletes records in one round trip.
    ///
    /// An `Err` means the whole call failed. Otherwise every submitted record
    /// has its own entry in the outcome.
    async fn modify_records(
        &self,
        saving: Vec<Record>,
        deleting: Vec<RecordId>,
        policy: SavePolicy,
    ) -> StoreResult<ModifyOutcome>;

    /// Runs a query and returns its first page.
    async fn query(&self, query: &Query) -> StoreResult<QueryPage>;

    /// Continues a query from a cursor.
    async fn query_more(&self, cursor: &Cursor) -> StoreResult<QueryPage>;
}
