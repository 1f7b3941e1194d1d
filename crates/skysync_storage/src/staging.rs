//! Staged changes shared by the cache implementations.

use crate::model::StorageModel;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Change<M> {
    Upsert(M),
    Delete,
}

/// Uncommitted changes layered over a committed map.
#[derive(Debug, Clone)]
pub(crate) struct ChangeSet<M> {
    changes: BTreeMap<String, Change<M>>,
}

impl<M: StorageModel> ChangeSet<M> {
    pub(crate) fn new() -> Self {
        Self {
            changes: BTreeMap::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.changes.clear();
    }

    pub(crate) fn stage_insert(&mut self, model: M) {
        self.changes
            .insert(model.key().to_string(), Change::Upsert(model));
    }

    /// Stages a delete. Returns false if the key is absent from the overlay.
    pub(crate) fn stage_delete(&mut self, key: &str, committed: &BTreeMap<String, M>) -> bool {
        match self.changes.get(key) {
            Some(Change::Delete) => false,
            Some(Change::Upsert(_)) => {
                if committed.contains_key(key) {
                    self.changes.insert(key.to_string(), Change::Delete);
                } else {
                    // Inserted and deleted within one transaction.
                    self.changes.remove(key);
                }
                true
            }
            None => {
                if committed.contains_key(key) {
                    self.changes.insert(key.to_string(), Change::Delete);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Returns the committed map with every staged change applied.
    pub(crate) fn overlay(&self, committed: &BTreeMap<String, M>) -> BTreeMap<String, M> {
        let mut merged = committed.clone();
        for (key, change) in &self.changes {
            match change {
                Change::Upsert(model) => {
                    merged.insert(key.clone(), model.clone());
                }
                Change::Delete => {
                    merged.remove(key);
                }
            }
        }
        merged
    }

    pub(crate) fn get<'a>(&'a self, key: &str, committed: &'a BTreeMap<String, M>) -> Option<&'a M> {
        match self.changes.get(key) {
            Some(Change::Upsert(model)) => Some(model),
            Some(Change::Delete) => None,
            None => committed.get(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone, PartialEq)]
    struct Row(String, DateTime<Utc>);

    impl StorageModel for Row {
        fn key(&self) -> &str {
            &self.0
        }
        fn change_date(&self) -> DateTime<Utc> {
            self.1
        }
        fn set_change_date(&mut self, date: DateTime<Utc>) {
            self.1 = date;
        }
    }

    fn row(key: &str) -> Row {
        Row(key.to_string(), DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn insert_then_delete_cancels_out() {
        let committed = BTreeMap::new();
        let mut set = ChangeSet::new();

        set.stage_insert(row("a"));
        assert!(set.stage_delete("a", &committed));
        assert!(set.is_empty());
    }

    #[test]
    fn delete_of_committed_key_is_staged() {
        let mut committed = BTreeMap::new();
        committed.insert("a".to_string(), row("a"));
        let mut set = ChangeSet::new();

        assert!(set.stage_delete("a", &committed));
        assert!(!set.stage_delete("a", &committed));
        assert!(set.overlay(&committed).is_empty());
        assert!(set.get("a", &committed).is_none());
    }

    #[test]
    fn delete_of_unknown_key_is_noop() {
        let committed: BTreeMap<String, Row> = BTreeMap::new();
        let mut set = ChangeSet::new();
        assert!(!set.stage_delete("missing", &committed));
        assert!(set.is_empty());
    }
}
