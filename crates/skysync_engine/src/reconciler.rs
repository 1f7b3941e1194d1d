//! Local/remote reconciliation.

use crate::config::{DeletionStrategy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::lifecycle::LifecycleSource;
use crate::poller::RemotePoller;
use crate::storable::{FieldMapping, Storable};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use skysync_feed::{DeliveryQueue, SnapshotFeed, SubscriptionToken};
use skysync_remote::{RemoteGateway, SavePolicy};
use skysync_storage::{Cache, CacheResult, FileCache, StorageModel};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Models created for remote entities with no local counterpart.
    pub inserted: usize,
    /// Models overwritten by newer remote entities.
    pub remote_wins: usize,
    /// Newer local models pushed back to the remote store.
    pub pushed: usize,
    /// Push-backs that failed.
    pub push_failures: usize,
    /// Models removed under [`DeletionStrategy::Remove`].
    pub deleted: usize,
    /// Entities whose change date matched the cached model.
    pub unchanged: usize,
    /// Whether staged cache changes were committed.
    pub committed: bool,
}

impl ReconcileReport {
    /// Returns true if the pass changed neither the cache nor the remote
    /// store.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0
            && self.remote_wins == 0
            && self.pushed == 0
            && self.push_failures == 0
            && self.deleted == 0
    }
}

/// Cache changes staged from a remote snapshot, waiting on push-back.
struct StagedPass<E> {
    push: Vec<E>,
    stale_keys: Vec<String>,
}

struct EngineInner<E: Storable> {
    config: SyncConfig,
    gateway: Arc<RemoteGateway>,
    cache: Mutex<Box<dyn Cache<E::Model>>>,
    mapping: FieldMapping<E, E::Model>,
    entities: RwLock<Arc<[E]>>,
    feed: SnapshotFeed<E>,
    pass_lock: tokio::sync::Mutex<()>,
}

impl<E: Storable> EngineInner<E> {
    async fn update_database(&self, remote: &[E]) -> SyncResult<ReconcileReport> {
        let _pass = self.pass_lock.lock().await;
        let mut report = ReconcileReport::default();

        let staged = {
            let mut cache = self.cache.lock();
            match self.stage_remote(cache.as_mut(), remote, &mut report) {
                Ok(staged) => staged,
                Err(e) => {
                    cache.rollback();
                    return Err(e.into());
                }
            }
        };

        if !staged.push.is_empty() {
            self.push_back(&staged.push, &mut report).await;
        }

        let models = {
            let mut cache = self.cache.lock();
            if let Err(e) = self.finish_pass(cache.as_mut(), &staged.stale_keys, &mut report) {
                cache.rollback();
                return Err(e.into());
            }
            cache.fetch_all()?
        };

        self.publish(&models);
        if self.config.debug_logging {
            debug!(record_type = E::RECORD_TYPE, ?report, "reconciliation pass finished");
        }
        Ok(report)
    }

    /// Diffs the remote snapshot against cached models and stages inserts and
    /// remote-wins updates. Only the first entity for a key is considered.
    fn stage_remote(
        &self,
        cache: &mut dyn Cache<E::Model>,
        remote: &[E],
        report: &mut ReconcileReport,
    ) -> CacheResult<StagedPass<E>> {
        let current: HashMap<String, E::Model> = cache
            .fetch_all()?
            .into_iter()
            .map(|m| (m.key().to_string(), m))
            .collect();

        let mut seen: HashSet<&str> = HashSet::with_capacity(remote.len());
        let mut push = Vec::new();

        for entity in remote {
            let key = entity.record_id().name();
            if !seen.insert(key) {
                if self.config.debug_logging {
                    debug!(record_type = E::RECORD_TYPE, key, "skipping duplicate remote key");
                }
                continue;
            }

            let Some(model) = current.get(key) else {
                cache.insert(entity.to_model())?;
                report.inserted += 1;
                continue;
            };

            let local_date = model.change_date();
            let remote_date = entity.change_date();
            if local_date == remote_date {
                report.unchanged += 1;
            } else if local_date < remote_date {
                let mut model = model.clone();
                self.mapping.update_model(&mut model, entity);
                model.set_change_date(remote_date);
                cache.insert(model)?;
                report.remote_wins += 1;
            } else {
                let mut entity = entity.clone();
                self.mapping.update_entity(&mut entity, model);
                entity.set_change_date(local_date);
                push.push(entity);
            }
        }

        let stale_keys = current
            .keys()
            .filter(|key| !seen.contains(key.as_str()))
            .cloned()
            .collect();

        if self.config.debug_logging {
            debug!(
                record_type = E::RECORD_TYPE,
                inserted = report.inserted,
                remote_wins = report.remote_wins,
                local_wins = push.len(),
                unchanged = report.unchanged,
                "staged remote snapshot"
            );
        }
        Ok(StagedPass { push, stale_keys })
    }

    async fn push_back(&self, entities: &[E], report: &mut ReconcileReport) {
        match self
            .gateway
            .save_all(entities, SavePolicy::IfServerRecordUnchanged)
            .await
        {
            Ok(results) => {
                for (entity, result) in entities.iter().zip(results) {
                    match result {
                        Ok(_) => report.pushed += 1,
                        Err(e) => {
                            report.push_failures += 1;
                            warn!(
                                record_type = E::RECORD_TYPE,
                                id = %entity.record_id(),
                                error = %e,
                                "push-back save failed"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                report.push_failures += entities.len();
                warn!(
                    record_type = E::RECORD_TYPE,
                    entities = entities.len(),
                    error = %e,
                    "push-back batch failed"
                );
            }
        }
    }

    /// Applies the deletion strategy and commits.
    ///
    /// A failed commit is logged and rolled back; the pass still publishes
    /// whatever the cache holds.
    fn finish_pass(
        &self,
        cache: &mut dyn Cache<E::Model>,
        stale_keys: &[String],
        report: &mut ReconcileReport,
    ) -> CacheResult<()> {
        if self.config.deletion_strategy == DeletionStrategy::Remove {
            for key in stale_keys {
                if cache.delete(key)? {
                    report.deleted += 1;
                }
            }
        }

        if cache.has_changes() {
            match cache.commit() {
                Ok(()) => report.committed = true,
                Err(e) => {
                    warn!(record_type = E::RECORD_TYPE, error = %e, "cache commit failed, discarding pass");
                    cache.rollback();
                }
            }
        }
        Ok(())
    }

    fn publish(&self, models: &[E::Model]) {
        let entities: Arc<[E]> = models.iter().filter_map(E::from_model).collect();
        if entities.len() != models.len() {
            warn!(
                record_type = E::RECORD_TYPE,
                unreadable = models.len() - entities.len(),
                "skipped cached models that could not be rebuilt"
            );
        }
        *self.entities.write() = Arc::clone(&entities);
        self.feed.publish(entities);
    }

    fn load(&self) -> SyncResult<()> {
        let models = self.cache.lock().fetch_all()?;
        let entities: Arc<[E]> = models.iter().filter_map(E::from_model).collect();
        *self.entities.write() = entities;
        Ok(())
    }
}

struct EngineDriver {
    poller_token: SubscriptionToken,
    task: JoinHandle<()>,
}

/// Mirrors a remote collection into a local cache.
///
/// Every snapshot published by the engine's [`RemotePoller`] runs one
/// reconciliation pass ([`update_database`](Self::update_database)):
///
/// 1. Remote entities with no cached model are inserted.
/// 2. Equal change dates are left alone.
/// 3. A newer remote entity overwrites its model (remote wins).
/// 4. A newer model overwrites the entity, which is pushed back to the
///    remote store in one batch (local wins). Push failures are logged.
/// 5. Under [`DeletionStrategy::Remove`], models missing remotely are
///    deleted.
/// 6. Staged changes are committed in one transaction, and the cache
///    contents are published to subscribers as the new local snapshot.
///
/// Passes never overlap. When snapshots arrive faster than passes finish,
/// only the newest waiting snapshot is reconciled.
///
/// Equal change dates are treated as "no conflict" even when field values
/// differ; such divergence persists until either side changes again.
///
/// # Blocking
///
/// Cache commits run on the calling task. With a [`FileCache`] this is
/// synchronous file I/O.
pub struct ReconciliationEngine<E: Storable> {
    inner: Arc<EngineInner<E>>,
    poller: RemotePoller<E>,
    driver: Mutex<Option<EngineDriver>>,
}

impl<E: Storable> ReconciliationEngine<E> {
    /// Creates a stopped engine over `cache` and loads the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the cache cannot
    /// be read.
    pub fn new(
        config: SyncConfig,
        gateway: Arc<RemoteGateway>,
        cache: impl Cache<E::Model> + 'static,
        mapping: FieldMapping<E, E::Model>,
        lifecycle: Arc<dyn LifecycleSource>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let poller = RemotePoller::new(Arc::clone(&gateway), config.poller_config(), lifecycle)?;
        let inner = Arc::new(EngineInner {
            config,
            gateway,
            cache: Mutex::new(Box::new(cache)),
            mapping,
            entities: RwLock::new(Arc::from(Vec::new())),
            feed: SnapshotFeed::new(),
            pass_lock: tokio::sync::Mutex::new(()),
        });
        inner.load()?;

        Ok(Self {
            inner,
            poller,
            driver: Mutex::new(None),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Returns the remote gateway.
    pub fn gateway(&self) -> &Arc<RemoteGateway> {
        &self.inner.gateway
    }

    /// Returns the underlying poller.
    pub fn poller(&self) -> &RemotePoller<E> {
        &self.poller
    }

    /// Starts polling and reconciling. Does nothing if already running.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NoRuntime` outside a Tokio runtime.
    pub fn start(&self) -> SyncResult<()> {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return Ok(());
        }
        let handle = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel::<Arc<[E]>>();
        let poller_token = self
            .poller
            .subscribe_to_changes_on(DeliveryQueue::immediate(), move |snapshot| {
                let _ = tx.send(snapshot);
            });
        let task = handle.spawn(reconcile_loop(Arc::clone(&self.inner), rx));

        if let Err(e) = self.poller.start() {
            self.poller.unsubscribe_from_changes(poller_token);
            task.abort();
            return Err(e);
        }

        if self.inner.config.debug_logging {
            debug!(record_type = E::RECORD_TYPE, "reconciliation engine started");
        }
        *driver = Some(EngineDriver { poller_token, task });
        Ok(())
    }

    /// Stops polling and reconciling. Does nothing if not running.
    ///
    /// A pass already running, and any snapshot already delivered, still
    /// complete.
    pub fn stop(&self) {
        let Some(driver) = self.driver.lock().take() else {
            return;
        };
        self.poller.stop();
        self.poller.unsubscribe_from_changes(driver.poller_token);
        if self.inner.config.debug_logging {
            debug!(record_type = E::RECORD_TYPE, "reconciliation engine stopped");
        }
    }

    /// Returns true between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.driver.lock().is_some()
    }

    /// Refreshes the remote snapshot.
    ///
    /// While running, the new snapshot reaches the engine through the
    /// poller's notifications and is reconciled in the background. While
    /// stopped, the pass runs before this returns.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the refresh fails, or the cache error if
    /// a foreground pass fails.
    pub async fn refresh(&self) -> SyncResult<()> {
        self.poller.refresh().await?;
        if !self.is_running() {
            let snapshot = self.poller.entities();
            self.inner.update_database(&snapshot).await?;
        }
        Ok(())
    }

    /// Runs one reconciliation pass against `remote`.
    ///
    /// Push-back and commit failures are logged and counted in the report,
    /// not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read or staged into. Staged
    /// changes are rolled back.
    pub async fn update_database(&self, remote: &[E]) -> SyncResult<ReconcileReport> {
        self.inner.update_database(remote).await
    }

    /// Returns the local snapshot.
    pub fn entities(&self) -> Arc<[E]> {
        self.inner.entities.read().clone()
    }

    /// Registers a callback receiving every local snapshot on a serial queue.
    pub fn subscribe_to_changes<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(Arc<[E]>) + Send + Sync + 'static,
    {
        self.subscribe_to_changes_on(DeliveryQueue::serial(), callback)
    }

    /// Registers a local snapshot callback delivered on `queue`.
    pub fn subscribe_to_changes_on<F>(&self, queue: DeliveryQueue, callback: F) -> SubscriptionToken
    where
        F: Fn(Arc<[E]>) + Send + Sync + 'static,
    {
        self.inner.feed.subscribe(queue, callback)
    }

    /// Removes a local snapshot callback. Returns false if it was not
    /// registered.
    pub fn unsubscribe_from_changes(&self, token: SubscriptionToken) -> bool {
        self.inner.feed.unsubscribe(token)
    }
}

impl<E> ReconciliationEngine<E>
where
    E: Storable,
    E::Model: Serialize + DeserializeOwned,
{
    /// Creates an engine over a [`FileCache`] at `config.cache_path`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` without a cache path, or the cache error
    /// if the directory cannot be opened.
    pub fn open(
        config: SyncConfig,
        gateway: Arc<RemoteGateway>,
        mapping: FieldMapping<E, E::Model>,
        lifecycle: Arc<dyn LifecycleSource>,
    ) -> SyncResult<Self> {
        let path = config
            .cache_path
            .clone()
            .ok_or_else(|| SyncError::Config("cache path is required".into()))?;
        let cache: FileCache<E::Model> = FileCache::open(&path)?;
        Self::new(config, gateway, cache, mapping, lifecycle)
    }
}

impl<E: Storable> Drop for ReconciliationEngine<E> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            self.poller.unsubscribe_from_changes(driver.poller_token);
            driver.task.abort();
        }
    }
}

impl<E: Storable> fmt::Debug for ReconciliationEngine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("record_type", &E::RECORD_TYPE)
            .field("running", &self.is_running())
            .field("entities", &self.inner.entities.read().len())
            .field("deletion_strategy", &self.inner.config.deletion_strategy)
            .finish()
    }
}

async fn reconcile_loop<E: Storable>(
    inner: Arc<EngineInner<E>>,
    mut snapshots: mpsc::UnboundedReceiver<Arc<[E]>>,
) {
    while let Some(mut snapshot) = snapshots.recv().await {
        while let Ok(newer) = snapshots.try_recv() {
            snapshot = newer;
        }
        if let Err(e) = inner.update_database(&snapshot).await {
            warn!(record_type = E::RECORD_TYPE, error = %e, "reconciliation pass failed");
        }
    }
}
