//! In-memory remote store for tests and demos.

use crate::error::{StoreError, StoreResult};
use crate::predicate::Query;
use crate::record::{Record, RecordId};
use crate::store::{Cursor, ModifyOutcome, QueryPage, RemoteStore, SavePolicy};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Default number of results per query page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Most unfinished queries kept at once. Opening another evicts the oldest.
pub const MAX_OPEN_CURSORS: usize = 64;

/// Call counters kept by [`MemoryRemoteStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// `fetch_record` and `fetch_records` calls.
    pub fetches: u64,
    /// Single-record saves, including the saves inside batches.
    pub saves: u64,
    /// Single-record deletes, including the deletes inside batches.
    pub deletes: u64,
    /// `modify_records` calls.
    pub batches: u64,
    /// `query` calls.
    pub queries: u64,
    /// Pages served by `query` and `query_more`.
    pub pages: u64,
}

#[derive(Default)]
struct State {
    records: BTreeMap<RecordId, Record>,
    next_tag: u64,
    page_size: usize,
    cursors: HashMap<String, Vec<(RecordId, StoreResult<Record>)>>,
    cursor_order: VecDeque<String>,
    failing_saves: HashSet<RecordId>,
    failing_deletes: HashSet<RecordId>,
    unreadable: HashSet<RecordId>,
    next_query_error: Option<StoreError>,
    unreachable: bool,
    stats: StoreStats,
}

impl State {
    fn reachable(&self) -> StoreResult<()> {
        if self.unreachable {
            Err(StoreError::network("store unreachable"))
        } else {
            Ok(())
        }
    }

    fn write(&mut self, record: Record, policy: SavePolicy) -> StoreResult<Record> {
        self.stats.saves += 1;
        let id = record.id().clone();
        if self.failing_saves.contains(&id) {
            return Err(StoreError::rejected(format!("save refused for {id}")));
        }

        if policy == SavePolicy::IfServerRecordUnchanged {
            let server_tag = self.records.get(&id).and_then(|r| r.change_tag());
            match (server_tag, record.change_tag()) {
                (Some(server), Some(local)) if server != local => {
                    return Err(StoreError::server_record_changed(&id));
                }
                (Some(_), None) => return Err(StoreError::server_record_changed(&id)),
                (None, Some(_)) => return Err(StoreError::not_found(&id)),
                _ => {}
            }
        }

        Ok(self.store(record))
    }

    fn store(&mut self, mut record: Record) -> Record {
        self.next_tag += 1;
        record.set_change_tag(Some(format!("tag-{}", self.next_tag)));
        self.records.insert(record.id().clone(), record.clone());
        record
    }

    fn remove(&mut self, id: &RecordId) -> StoreResult<()> {
        self.stats.deletes += 1;
        if self.failing_deletes.contains(id) {
            return Err(StoreError::rejected(format!("delete refused for {id}")));
        }
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(id))
    }

    fn read(&self, id: &RecordId) -> StoreResult<Record> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    fn open_cursor(&mut self, token: String, rest: Vec<(RecordId, StoreResult<Record>)>) {
        while self.cursor_order.len() >= MAX_OPEN_CURSORS {
            let Some(oldest) = self.cursor_order.pop_front() else {
                break;
            };
            self.cursors.remove(&oldest);
        }
        self.cursor_order.push_back(token.clone());
        self.cursors.insert(token, rest);
    }

    fn take_cursor(&mut self, token: &str) -> Option<Vec<(RecordId, StoreResult<Record>)>> {
        let rest = self.cursors.remove(token)?;
        self.cursor_order.retain(|open| open != token);
        Some(rest)
    }

    fn page(&mut self, mut results: Vec<(RecordId, StoreResult<Record>)>) -> QueryPage {
        self.stats.pages += 1;
        let page_size = self.page_size.max(1);
        if results.len() <= page_size {
            return QueryPage {
                results,
                cursor: None,
            };
        }

        let rest = results.split_off(page_size);
        let token = Uuid::new_v4().to_string();
        self.open_cursor(token.clone(), rest);
        QueryPage {
            results,
            cursor: Some(Cursor::new(token)),
        }
    }
}

/// A [`RemoteStore`] that keeps records in memory.
///
/// Records are returned in record id order. Queries snapshot their result set
/// when they start, so later writes do not shift pages already handed out.
/// At most [`MAX_OPEN_CURSORS`] unfinished queries are remembered; cursors of
/// older abandoned queries become invalid.
///
/// The store can be told to misbehave:
///
/// - [`fail_saves_for`](Self::fail_saves_for) and
///   [`fail_deletes_for`](Self::fail_deletes_for) reject single records
/// - [`make_unreadable`](Self::make_unreadable) reports a per-record error in
///   query results
/// - [`fail_next_query`](Self::fail_next_query) fails one query call
/// - [`set_unreachable`](Self::set_unreachable) fails every call
pub struct MemoryRemoteStore {
    state: Mutex<State>,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store serving `page_size` results per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State {
                page_size,
                ..State::default()
            }),
        }
    }

    /// Stores a record directly, bypassing faults and counters.
    ///
    /// Returns the stored copy with its new change tag.
    pub fn seed(&self, record: Record) -> Record {
        self.state.lock().store(record)
    }

    /// Returns the current server copy of a record.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.state.lock().records.get(id).cloned()
    }

    /// Returns every stored record in id order.
    pub fn records(&self) -> Vec<Record> {
        self.state.lock().records.values().cloned().collect()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    /// Changes the page size for future queries.
    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().page_size = page_size;
    }

    /// Rejects every save of `id` until faults are cleared.
    pub fn fail_saves_for(&self, id: RecordId) {
        self.state.lock().failing_saves.insert(id);
    }

    /// Rejects every delete of `id` until faults are cleared.
    pub fn fail_deletes_for(&self, id: RecordId) {
        self.state.lock().failing_deletes.insert(id);
    }

    /// Reports `id` as an error in query results until faults are cleared.
    pub fn make_unreadable(&self, id: RecordId) {
        self.state.lock().unreadable.insert(id);
    }

    /// Fails the next `query` call with `error`.
    pub fn fail_next_query(&self, error: StoreError) {
        self.state.lock().next_query_error = Some(error);
    }

    /// Fails every call with a network error while set.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Clears every injected fault.
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.failing_saves.clear();
        state.failing_deletes.clear();
        state.unreadable.clear();
        state.next_query_error = None;
        state.unreachable = false;
    }

    /// Returns the number of cursors still waiting for `query_more`.
    pub fn open_cursors(&self) -> usize {
        self.state.lock().cursors.len()
    }

    /// Returns the call counters.
    pub fn stats(&self) -> StoreStats {
        self.state.lock().stats
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryRemoteStore")
            .field("records", &state.records.len())
            .field("page_size", &state.page_size)
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_record(&self, id: &RecordId) -> StoreResult<Record> {
        let mut state = self.state.lock();
        state.reachable()?;
        state.stats.fetches += 1;
        state.read(id)
    }

    async fn fetch_records(
        &self,
        ids: &[RecordId],
    ) -> StoreResult<Vec<(RecordId, StoreResult<Record>)>> {
        let mut state = self.state.lock();
        state.reachable()?;
        state.stats.fetches += 1;
        Ok(ids.iter().map(|id| (id.clone(), state.read(id))).collect())
    }

    async fn save_record(&self, record: Record) -> StoreResult<Record> {
        let mut state = self.state.lock();
        state.reachable()?;
        state.write(record, SavePolicy::IfServerRecordUnchanged)
    }

    async fn delete_record(&self, id: &RecordId) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.reachable()?;
        state.remove(id)
    }

    async fn modify_records(
        &self,
        saving: Vec<Record>,
        deleting: Vec<RecordId>,
        policy: SavePolicy,
    ) -> StoreResult<ModifyOutcome> {
        let mut state = self.state.lock();
        state.reachable()?;
        state.stats.batches += 1;

        let saved = saving
            .into_iter()
            .map(|record| (record.id().clone(), state.write(record, policy)))
            .collect();
        let deleted = deleting
            .into_iter()
            .map(|id| {
                let result = state.remove(&id);
                (id, result)
            })
            .collect();
        Ok(ModifyOutcome { saved, deleted })
    }

    async fn query(&self, query: &Query) -> StoreResult<QueryPage> {
        let mut state = self.state.lock();
        state.reachable()?;
        state.stats.queries += 1;
        if let Some(error) = state.next_query_error.take() {
            return Err(error);
        }

        let results: Vec<(RecordId, StoreResult<Record>)> = state
            .records
            .values()
            .filter(|record| query.matches(record))
            .map(|record| {
                let id = record.id().clone();
                if state.unreadable.contains(&id) {
                    let error = StoreError::rejected(format!("record {id} is unreadable"));
                    (id, Err(error))
                } else {
                    (id, Ok(record.clone()))
                }
            })
            .collect();
        Ok(state.page(results))
    }

    async fn query_more(&self, cursor: &Cursor) -> StoreResult<QueryPage> {
        let mut state = self.state.lock();
        state.reachable()?;
        let rest = state
            .take_cursor(cursor.as_str())
            .ok_or_else(|| StoreError::invalid_cursor(cursor.as_str()))?;
        Ok(state.page(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;
    use crate::StoreErrorKind;

    fn note(id: &str, title: &str) -> Record {
        Record::new("Note", RecordId::new(id)).with_field("title", title)
    }

    #[tokio::test]
    async fn save_assigns_change_tags() {
        let store = MemoryRemoteStore::new();
        let first = store.save_record(note("n1", "a")).await.unwrap();
        assert_eq!(first.change_tag(), Some("tag-1"));

        let mut edited = first.clone();
        edited.set("title", "b");
        let second = store.save_record(edited).await.unwrap();
        assert_eq!(second.change_tag(), Some("tag-2"));
        assert_eq!(store.get(&RecordId::new("n1")).unwrap().text("title"), Some("b"));
    }

    #[tokio::test]
    async fn stale_tag_is_rejected_unless_overwriting() {
        let store = MemoryRemoteStore::new();
        let stale = store.seed(note("n1", "a"));
        store.seed(stale.clone().with_field("title", "server"));

        let err = store.save_record(stale.clone()).await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::ServerRecordChanged);

        let outcome = store
            .modify_records(vec![stale], Vec::new(), SavePolicy::Overwrite)
            .await
            .unwrap();
        assert!(outcome.saved[0].1.is_ok());
    }

    #[tokio::test]
    async fn query_pages_follow_cursors() {
        let store = MemoryRemoteStore::with_page_size(2);
        for i in 0..5 {
            store.seed(note(&format!("n{i}"), "x"));
        }

        let query = Query::new("Note", Predicate::All);
        let first = store.query(&query).await.unwrap();
        assert_eq!(first.results.len(), 2);
        let second = store.query_more(first.cursor.as_ref().unwrap()).await.unwrap();
        assert_eq!(second.results.len(), 2);
        let third = store.query_more(second.cursor.as_ref().unwrap()).await.unwrap();
        assert_eq!(third.results.len(), 1);
        assert!(third.cursor.is_none());
        assert_eq!(store.stats().pages, 3);

        let reused = store.query_more(first.cursor.as_ref().unwrap()).await;
        assert_eq!(reused.unwrap_err().kind, StoreErrorKind::InvalidCursor);
    }

    #[tokio::test]
    async fn abandoned_queries_are_evicted_oldest_first() {
        let store = MemoryRemoteStore::with_page_size(1);
        store.seed(note("n1", "x"));
        store.seed(note("n2", "y"));

        let query = Query::new("Note", Predicate::All);
        let oldest = store.query(&query).await.unwrap().cursor.unwrap();
        let mut newest = None;
        for _ in 0..MAX_OPEN_CURSORS {
            newest = store.query(&query).await.unwrap().cursor;
        }
        assert_eq!(store.open_cursors(), MAX_OPEN_CURSORS);

        let evicted = store.query_more(&oldest).await.unwrap_err();
        assert_eq!(evicted.kind, StoreErrorKind::InvalidCursor);

        let last = store.query_more(newest.as_ref().unwrap()).await.unwrap();
        assert_eq!(last.results[0].0, RecordId::new("n2"));
        assert!(last.cursor.is_none());
        assert_eq!(store.open_cursors(), MAX_OPEN_CURSORS - 1);
    }

    #[tokio::test]
    async fn unreachable_fails_every_call() {
        let store = MemoryRemoteStore::new();
        store.set_unreachable(true);

        let err = store.fetch_record(&RecordId::new("n1")).await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Network);
        assert!(store
            .query(&Query::new("Note", Predicate::All))
            .await
            .is_err());

        store.clear_faults();
        assert!(store
            .query(&Query::new("Note", Predicate::All))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn batch_reports_each_item() {
        let store = MemoryRemoteStore::new();
        let a = store.seed(note("a", "x"));
        let b = store.seed(note("b", "y"));
        store.fail_saves_for(RecordId::new("b"));
        store.fail_deletes_for(RecordId::new("c"));

        let outcome = store
            .modify_records(
                vec![a, b],
                vec![RecordId::new("c")],
                SavePolicy::IfServerRecordUnchanged,
            )
            .await
            .unwrap();
        assert!(outcome.saved[0].1.is_ok());
        assert_eq!(
            outcome.saved[1].1.as_ref().unwrap_err().kind,
            StoreErrorKind::Rejected
        );
        assert!(outcome.deleted[0].1.is_err());
        assert_eq!(store.stats().batches, 1);
    }
}
