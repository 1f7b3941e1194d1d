//! Cache trait definition.

use crate::error::CacheResult;
use crate::model::StorageModel;

/// A transactional key to model mapping.
///
/// Caches do not interpret their models beyond the key. They provide a
/// staging area on top of the committed state:
///
/// # Invariants
///
/// - `fetch_all` reflects committed state overlaid with staged changes
/// - `insert` replaces any model with the same key
/// - `commit` applies every staged change or none of them
/// - `rollback` restores the last committed state
/// - Caches must be `Send` so an engine can own one across tasks
///
/// # Implementors
///
/// - [`super::InMemoryCache`] - For testing
/// - [`super::FileCache`] - For persistent storage
pub trait Cache<M: StorageModel>: Send {
    /// Returns every model, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn fetch_all(&self) -> CacheResult<Vec<M>>;

    /// Returns the model stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> CacheResult<Option<M>> {
        Ok(self.fetch_all()?.into_iter().find(|m| m.key() == key))
    }

    /// Stages an insert, replacing any model with the same key.
    ///
    /// Mutating a model in place is expressed as fetching it, changing it
    /// and inserting it again.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot accept writes.
    fn insert(&mut self, model: M) -> CacheResult<()>;

    /// Stages the deletion of `key`. Returns false if no such model exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot accept writes.
    fn delete(&mut self, key: &str) -> CacheResult<bool>;

    /// Returns true if there are staged changes.
    fn has_changes(&self) -> bool;

    /// Makes every staged change durable as one transaction.
    ///
    /// On failure the staged changes are kept, so the caller can retry or
    /// roll back.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction could not be written.
    fn commit(&mut self) -> CacheResult<()>;

    /// Discards every staged change.
    fn rollback(&mut self);
}
