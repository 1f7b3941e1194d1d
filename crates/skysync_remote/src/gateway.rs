//! Typed access to a remote store.

use crate::error::{GatewayError, GatewayResult, StoreError};
use crate::predicate::{Predicate, Query};
use crate::record::{Record, RecordId};
use crate::recordable::Recordable;
use crate::store::{RemoteStore, SavePolicy};
use crate::StoreResult;
use skysync_feed::{DeliveryQueue, SubscriberList, SubscriptionToken};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Typed create, save, delete and query operations over a [`RemoteStore`].
///
/// Failures are normalized into [`GatewayError`]. Batch operations report
/// one result per input entity, in input order, so one bad item never fails
/// the rest.
///
/// Every successful mutation notifies the gateway's change subscribers.
/// Pollers use this to refresh after local writes.
///
/// # Example
///
/// ```rust,ignore
/// use skysync_remote::{MemoryRemoteStore, Predicate, RemoteGateway};
/// use std::sync::Arc;
///
/// let gateway = RemoteGateway::new(Arc::new(MemoryRemoteStore::new()));
/// let note = gateway.create(&Note::new("groceries")).await?;
/// let notes: Vec<Note> = gateway.get_all(&Predicate::All).await?;
/// ```
pub struct RemoteGateway {
    store: Arc<dyn RemoteStore>,
    changes: SubscriberList<()>,
}

impl RemoteGateway {
    /// Creates a gateway over a store.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            changes: SubscriberList::new(),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Writes a brand-new record for `entity`.
    ///
    /// # Errors
    ///
    /// `CreateFailed` if the store rejects the write, `CreatedRecordInvalid`
    /// if the stored record cannot be rebuilt into `E`.
    pub async fn create<E: Recordable>(&self, entity: &E) -> GatewayResult<E> {
        let stored = self
            .store
            .save_record(entity.new_record())
            .await
            .map_err(GatewayError::CreateFailed)?;

        let created = E::from_record(&stored).ok_or(GatewayError::CreatedRecordInvalid {
            record_type: E::RECORD_TYPE,
        })?;
        debug!(record_type = E::RECORD_TYPE, id = %stored.id(), "created record");
        self.notify_changes();
        Ok(created)
    }

    /// Builds an entity with `constructor` and creates it.
    pub async fn create_with<E, F>(&self, constructor: F) -> GatewayResult<E>
    where
        E: Recordable,
        F: FnOnce() -> E + Send,
    {
        let entity = constructor();
        self.create(&entity).await
    }

    /// Saves `entity` over the current server copy.
    ///
    /// The current record is fetched first and only the entity's fields are
    /// written onto it, so the save never blindly replaces the server record.
    ///
    /// # Errors
    ///
    /// `SaveFailed` if the fetch or the write fails, `SavedRecordInvalid` if
    /// the stored record cannot be rebuilt into `E`.
    pub async fn save<E: Recordable>(&self, entity: &E) -> GatewayResult<E> {
        let mut record = self
            .store
            .fetch_record(entity.record_id())
            .await
            .map_err(GatewayError::SaveFailed)?;
        entity.apply_to(&mut record);

        let stored = self
            .store
            .save_record(record)
            .await
            .map_err(GatewayError::SaveFailed)?;

        let saved = E::from_record(&stored).ok_or(GatewayError::SavedRecordInvalid {
            record_type: E::RECORD_TYPE,
        })?;
        debug!(record_type = E::RECORD_TYPE, id = %stored.id(), "saved record");
        self.notify_changes();
        Ok(saved)
    }

    /// Saves several entities in one batched write.
    ///
    /// Current records for every entity are fetched first. Entities whose
    /// record could not be fetched fail with `FetchFailed` and are not
    /// written. The rest are submitted together under `policy`.
    ///
    /// The returned vector has exactly one entry per input entity, in input
    /// order. Change subscribers are notified only if at least one save
    /// succeeded.
    ///
    /// # Errors
    ///
    /// The outer error is `BatchSaveFailed` and is only returned when the
    /// store fails a whole call. Item failures are reported inside the vector.
    pub async fn save_all<E: Recordable>(
        &self,
        entities: &[E],
        policy: SavePolicy,
    ) -> GatewayResult<Vec<GatewayResult<E>>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<RecordId> = entities.iter().map(|e| e.record_id().clone()).collect();
        let fetched: HashMap<RecordId, StoreResult<Record>> = self
            .store
            .fetch_records(&ids)
            .await
            .map_err(GatewayError::BatchSaveFailed)?
            .into_iter()
            .collect();

        let mut saving = Vec::with_capacity(entities.len());
        for entity in entities {
            if let Some(Ok(current)) = fetched.get(entity.record_id()) {
                let mut record = current.clone();
                entity.apply_to(&mut record);
                saving.push(record);
            }
        }

        let saved: HashMap<RecordId, StoreResult<Record>> = if saving.is_empty() {
            HashMap::new()
        } else {
            let outcome = self
                .store
                .modify_records(saving, Vec::new(), policy)
                .await
                .map_err(GatewayError::BatchSaveFailed)?;
            if outcome.saved.iter().any(|(_, r)| r.is_ok()) {
                self.notify_changes();
            }
            outcome.saved.into_iter().collect()
        };

        let results: Vec<GatewayResult<E>> = entities
            .iter()
            .map(|entity| {
                let id = entity.record_id();
                match fetched.get(id) {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(GatewayError::FetchFailed(e.clone())),
                    None => return Err(GatewayError::FetchFailed(StoreError::not_found(id))),
                }
                match saved.get(id) {
                    Some(Ok(record)) => E::from_record(record).ok_or(
                        GatewayError::SavedRecordInvalid {
                            record_type: E::RECORD_TYPE,
                        },
                    ),
                    Some(Err(e)) => Err(GatewayError::BatchSaveFailed(e.clone())),
                    None => Err(GatewayError::Other(format!(
                        "store returned no result for record {id}"
                    ))),
                }
            })
            .collect();

        debug!(
            record_type = E::RECORD_TYPE,
            submitted = entities.len(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "saved record batch"
        );
        Ok(results)
    }

    /// Deletes the record for `entity` and hands the entity back.
    ///
    /// # Errors
    ///
    /// `DeleteFailed` if the store rejects the delete.
    pub async fn delete<E: Recordable>(&self, entity: E) -> GatewayResult<E> {
        self.store
            .delete_record(entity.record_id())
            .await
            .map_err(GatewayError::DeleteFailed)?;
        debug!(record_type = E::RECORD_TYPE, id = %entity.record_id(), "deleted record");
        self.notify_changes();
        Ok(entity)
    }

    /// Deletes several records in one batched call.
    ///
    /// Returns one result per input entity, in input order. Change
    /// subscribers are notified only if at least one delete succeeded.
    ///
    /// # Errors
    ///
    /// The outer `DeleteFailed` is only returned when the whole call fails.
    pub async fn delete_all<E: Recordable>(
        &self,
        entities: &[E],
    ) -> GatewayResult<Vec<GatewayResult<RecordId>>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<RecordId> = entities.iter().map(|e| e.record_id().clone()).collect();
        let outcome = self
            .store
            .modify_records(Vec::new(), ids.clone(), SavePolicy::default())
            .await
            .map_err(GatewayError::DeleteFailed)?;
        if outcome.deleted.iter().any(|(_, r)| r.is_ok()) {
            self.notify_changes();
        }

        let deleted: HashMap<RecordId, StoreResult<()>> = outcome.deleted.into_iter().collect();
        Ok(ids
            .into_iter()
            .map(|id| match deleted.get(&id) {
                Some(Ok(())) => Ok(id),
                Some(Err(e)) => Err(GatewayError::DeleteFailed(e.clone())),
                None => Err(GatewayError::Other(format!(
                    "store returned no result for record {id}"
                ))),
            })
            .collect())
    }

    /// Fetches every `E` matching `predicate`, following cursors until the
    /// result set is exhausted.
    ///
    /// # Errors
    ///
    /// `FetchFailed` if any page request fails. `Other` if any single record
    /// fails or cannot be rebuilt into `E`; no partial list is returned.
    pub async fn get_all<E: Recordable>(&self, predicate: &Predicate) -> GatewayResult<Vec<E>> {
        let query = Query::new(E::RECORD_TYPE, predicate.clone());
        let mut page = self
            .store
            .query(&query)
            .await
            .map_err(GatewayError::FetchFailed)?;

        let mut entities = Vec::new();
        let mut pages = 1usize;
        loop {
            for (id, result) in page.results {
                let record =
                    result.map_err(|e| GatewayError::Other(format!("record {id}: {e}")))?;
                let entity = E::from_record(&record).ok_or_else(|| {
                    GatewayError::Other(format!(
                        "record {id} could not be read as {}",
                        E::RECORD_TYPE
                    ))
                })?;
                entities.push(entity);
            }

            match page.cursor {
                Some(cursor) => {
                    page = self
                        .store
                        .query_more(&cursor)
                        .await
                        .map_err(GatewayError::FetchFailed)?;
                    pages += 1;
                }
                None => break,
            }
        }

        debug!(
            record_type = E::RECORD_TYPE,
            pages,
            records = entities.len(),
            "fetched records"
        );
        Ok(entities)
    }

    /// Sets one property with `setter`, then saves the entity.
    ///
    /// # Errors
    ///
    /// `UpdateFailed` wrapping the save error.
    pub async fn update_property<E, V, F>(&self, entity: E, setter: F, value: V) -> GatewayResult<E>
    where
        E: Recordable,
        V: Send,
        F: FnOnce(&mut E, V) + Send,
    {
        let mut entity = entity;
        setter(&mut entity, value);
        self.save(&entity)
            .await
            .map_err(|e| GatewayError::UpdateFailed(Box::new(e)))
    }

    /// Registers a callback run after every successful mutation.
    ///
    /// Callbacks are delivered on a serial queue on the current runtime.
    pub fn subscribe_to_changes<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_to_changes_on(DeliveryQueue::serial(), callback)
    }

    /// Registers a change callback delivered on `queue`.
    pub fn subscribe_to_changes_on<F>(&self, queue: DeliveryQueue, callback: F) -> SubscriptionToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.changes.subscribe(queue, move |()| callback())
    }

    /// Removes a change callback. Returns false if it was not registered.
    pub fn unsubscribe_from_changes(&self, token: SubscriptionToken) -> bool {
        self.changes.unsubscribe(token)
    }

    /// Returns the number of change subscribers.
    pub fn change_subscriber_count(&self) -> usize {
        self.changes.len()
    }

    fn notify_changes(&self) {
        self.changes.notify(());
    }
}

impl fmt::Debug for RemoteGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteGateway")
            .field("change_subscribers", &self.changes.len())
            .finish_non_exhaustive()
    }
}
