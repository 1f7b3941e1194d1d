//! Test fixtures.
//!
//! Wires an in-memory remote store, a gateway and a lifecycle notifier
//! together so tests only say what they seed and what they assert.

use crate::note::{note_mapping, Note};
use chrono::{DateTime, TimeZone, Utc};
use skysync_engine::{LifecycleNotifier, LifecycleSource, ReconciliationEngine, SyncConfig};
use skysync_remote::{MemoryRemoteStore, Record, Recordable, RemoteGateway};
use skysync_storage::Cache;
use std::sync::Arc;
use tempfile::TempDir;

/// Base of [`at`]: 2020-09-13T12:26:40Z.
pub const BASE_TIMESTAMP: i64 = 1_600_000_000;

/// Returns a fixed instant `offset` seconds after [`BASE_TIMESTAMP`].
pub fn at(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_TIMESTAMP + offset, 0)
        .single()
        .expect("timestamp in range")
}

/// Installs a `tracing` subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An in-memory remote side.
pub struct Harness {
    /// The remote store.
    pub store: Arc<MemoryRemoteStore>,
    /// Gateway over `store`.
    pub gateway: Arc<RemoteGateway>,
    /// Lifecycle notifier to drive by hand.
    pub lifecycle: LifecycleNotifier,
}

impl Harness {
    /// Creates an empty remote side.
    pub fn new() -> Self {
        Self::with_store(MemoryRemoteStore::new())
    }

    /// Creates a remote side over `store`.
    pub fn with_store(store: MemoryRemoteStore) -> Self {
        let store = Arc::new(store);
        let gateway = Arc::new(RemoteGateway::new(store.clone()));
        Self {
            store,
            gateway,
            lifecycle: LifecycleNotifier::new(),
        }
    }

    /// Returns the lifecycle notifier as a source.
    pub fn lifecycle_source(&self) -> Arc<dyn LifecycleSource> {
        Arc::new(self.lifecycle.clone())
    }

    /// Writes `entity` straight into the store, bypassing the gateway.
    pub fn seed<E: Recordable>(&self, entity: &E) -> Record {
        self.store.seed(entity.new_record())
    }

    /// Returns the stored copy of `entity`, if any, rebuilt as `E`.
    pub fn remote<E: Recordable>(&self, entity: &E) -> Option<E> {
        self.store
            .get(entity.record_id())
            .and_then(|record| E::from_record(&record))
    }

    /// Creates a stopped note engine over `cache`.
    pub fn note_engine(
        &self,
        config: SyncConfig,
        cache: impl Cache<crate::note::NoteModel> + 'static,
    ) -> ReconciliationEngine<Note> {
        ReconciliationEngine::new(
            config,
            Arc::clone(&self.gateway),
            cache,
            note_mapping(),
            self.lifecycle_source(),
        )
        .expect("Failed to create note engine")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary cache directory, removed on drop.
pub struct TempCacheDir {
    dir: TempDir,
}

impl TempCacheDir {
    /// Creates a fresh directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns a path inside the directory for a cache.
    pub fn cache_path(&self) -> std::path::PathBuf {
        self.dir.path().join("cache")
    }
}

impl Default for TempCacheDir {
    fn default() -> Self {
        Self::new()
    }
}
