//! In-memory cache for testing.

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::model::StorageModel;
use crate::staging::ChangeSet;
use std::collections::BTreeMap;
use std::io;

/// An in-memory cache.
///
/// This cache keeps everything in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Mirrors that don't need to survive a restart
///
/// Commits are atomic because they only swap in-memory maps.
#[derive(Debug, Clone)]
pub struct InMemoryCache<M> {
    committed: BTreeMap<String, M>,
    staged: ChangeSet<M>,
    commits: u64,
    fail_next_commit: bool,
}

impl<M: StorageModel> InMemoryCache<M> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            committed: BTreeMap::new(),
            staged: ChangeSet::new(),
            commits: 0,
            fail_next_commit: false,
        }
    }

    /// Creates a cache whose committed state already holds `models`.
    ///
    /// Useful for seeding a mirror before a reconciliation pass.
    #[must_use]
    pub fn with_models(models: impl IntoIterator<Item = M>) -> Self {
        let committed = models
            .into_iter()
            .map(|m| (m.key().to_string(), m))
            .collect();
        Self {
            committed,
            staged: ChangeSet::new(),
            commits: 0,
            fail_next_commit: false,
        }
    }

    /// Returns the number of successful commits.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Makes the next non-empty commit fail with an I/O error.
    ///
    /// Staged changes are left in place for the caller to roll back.
    pub fn fail_next_commit(&mut self) {
        self.fail_next_commit = true;
    }

    /// Returns the number of committed models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// Returns true if nothing is committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

impl<M: StorageModel> Default for InMemoryCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: StorageModel> Cache<M> for InMemoryCache<M> {
    fn fetch_all(&self) -> CacheResult<Vec<M>> {
        Ok(self.staged.overlay(&self.committed).into_values().collect())
    }

    fn get(&self, key: &str) -> CacheResult<Option<M>> {
        Ok(self.staged.get(key, &self.committed).cloned())
    }

    fn insert(&mut self, model: M) -> CacheResult<()> {
        self.staged.stage_insert(model);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> CacheResult<bool> {
        Ok(self.staged.stage_delete(key, &self.committed))
    }

    fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    fn commit(&mut self) -> CacheResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        if std::mem::take(&mut self.fail_next_commit) {
            return Err(CacheError::Io(io::Error::other("injected commit failure")));
        }
        self.committed = self.staged.overlay(&self.committed);
        self.staged.clear();
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }
}
