//! Periodic remote snapshot polling.

use crate::config::PollerConfig;
use crate::error::{SyncError, SyncResult};
use crate::lifecycle::{LifecycleEvent, LifecycleFilter, LifecycleSource};
use parking_lot::{Mutex, RwLock};
use skysync_feed::{DeliveryQueue, SnapshotFeed, SubscriptionToken};
use skysync_remote::{GatewayResult, Predicate, Recordable, RemoteGateway};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Why a refresh was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    Foreground,
    RemoteChange,
}

struct PollerInner<E> {
    gateway: Arc<RemoteGateway>,
    predicate: RwLock<Predicate>,
    entities: RwLock<Arc<[E]>>,
    feed: SnapshotFeed<E>,
    refresh_lock: tokio::sync::Mutex<()>,
    debug_logging: bool,
}

impl<E: Recordable> PollerInner<E> {
    async fn refresh(&self) -> GatewayResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let predicate = self.predicate.read().clone();

        match self.gateway.get_all::<E>(&predicate).await {
            Ok(entities) => {
                let snapshot: Arc<[E]> = entities.into();
                *self.entities.write() = Arc::clone(&snapshot);
                if self.debug_logging {
                    debug!(
                        record_type = E::RECORD_TYPE,
                        entities = snapshot.len(),
                        "remote snapshot refreshed"
                    );
                }
                self.feed.publish(snapshot);
                Ok(())
            }
            Err(e) => {
                warn!(record_type = E::RECORD_TYPE, error = %e, "remote refresh failed, keeping last snapshot");
                Err(e)
            }
        }
    }
}

/// Handles owned by a running poller.
struct Driver {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    lifecycle_token: SubscriptionToken,
    gateway_token: SubscriptionToken,
}

/// Keeps an in-memory snapshot of every remote `E` matching a predicate.
///
/// While running, the snapshot is refreshed:
///
/// - immediately on [`start`](Self::start)
/// - every `pull_interval`
/// - when the lifecycle source reports `WillEnterForeground`
/// - after any successful mutation through the gateway
///
/// Refreshes are single-flight: a refresh requested while another is running
/// waits for it and then runs. Every successful refresh replaces the
/// snapshot wholesale and publishes the full list to subscribers. A failed
/// refresh keeps the previous snapshot.
///
/// Stopping cancels future refreshes only. A refresh already in flight
/// completes and publishes.
pub struct RemotePoller<E: Recordable> {
    inner: Arc<PollerInner<E>>,
    lifecycle: Arc<dyn LifecycleSource>,
    pull_interval: Duration,
    driver: Mutex<Option<Driver>>,
}

impl<E: Recordable> RemotePoller<E> {
    /// Creates a stopped poller with an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if the configuration is invalid.
    pub fn new(
        gateway: Arc<RemoteGateway>,
        config: PollerConfig,
        lifecycle: Arc<dyn LifecycleSource>,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PollerInner {
                gateway,
                predicate: RwLock::new(config.predicate),
                entities: RwLock::new(Arc::from(Vec::new())),
                feed: SnapshotFeed::new(),
                refresh_lock: tokio::sync::Mutex::new(()),
                debug_logging: config.debug_logging,
            }),
            lifecycle,
            pull_interval: config.pull_interval,
            driver: Mutex::new(None),
        })
    }

    /// Starts polling. Does nothing if already running.
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

        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let foreground_tx = trigger_tx.clone();
        let lifecycle_token = self.lifecycle.register(
            LifecycleFilter::Only(LifecycleEvent::WillEnterForeground),
            Box::new(move |_| {
                let _ = foreground_tx.send(Trigger::Foreground);
            }),
        );
        let gateway_token = self
            .inner
            .gateway
            .subscribe_to_changes_on(DeliveryQueue::immediate(), move || {
                let _ = trigger_tx.send(Trigger::RemoteChange);
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = handle.spawn(drive(
            Arc::clone(&self.inner),
            self.pull_interval,
            trigger_rx,
            shutdown_rx,
        ));

        if self.inner.debug_logging {
            debug!(record_type = E::RECORD_TYPE, interval = ?self.pull_interval, "poller started");
        }
        *driver = Some(Driver {
            shutdown: shutdown_tx,
            task,
            lifecycle_token,
            gateway_token,
        });
        Ok(())
    }

    /// Stops polling. Does nothing if not running.
    ///
    /// Deregisters from the lifecycle source and from the gateway's change
    /// notifications.
    pub fn stop(&self) {
        let Some(driver) = self.driver.lock().take() else {
            return;
        };
        self.lifecycle.deregister(driver.lifecycle_token);
        self.inner.gateway.unsubscribe_from_changes(driver.gateway_token);
        let _ = driver.shutdown.send(());
        if self.inner.debug_logging {
            debug!(record_type = E::RECORD_TYPE, "poller stopped");
        }
    }

    /// Returns true between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.driver.lock().is_some()
    }

    /// Fetches the remote snapshot now.
    ///
    /// # Errors
    ///
    /// Returns the gateway error. The previous snapshot is kept.
    pub async fn refresh(&self) -> GatewayResult<()> {
        self.inner.refresh().await
    }

    /// Replaces the predicate and refreshes.
    ///
    /// # Errors
    ///
    /// Returns the refresh error. The new predicate stays in place.
    pub async fn set_predicate(&self, predicate: Predicate) -> GatewayResult<()> {
        *self.inner.predicate.write() = predicate;
        self.inner.refresh().await
    }

    /// Returns the current predicate.
    pub fn predicate(&self) -> Predicate {
        self.inner.predicate.read().clone()
    }

    /// Returns the current snapshot.
    pub fn entities(&self) -> Arc<[E]> {
        self.inner.entities.read().clone()
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &Arc<RemoteGateway> {
        &self.inner.gateway
    }

    /// Returns the pull interval.
    pub fn pull_interval(&self) -> Duration {
        self.pull_interval
    }

    /// Registers a callback receiving every new snapshot on a serial queue.
    pub fn subscribe_to_changes<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(Arc<[E]>) + Send + Sync + 'static,
    {
        self.subscribe_to_changes_on(DeliveryQueue::serial(), callback)
    }

    /// Registers a snapshot callback delivered on `queue`.
    pub fn subscribe_to_changes_on<F>(&self, queue: DeliveryQueue, callback: F) -> SubscriptionToken
    where
        F: Fn(Arc<[E]>) + Send + Sync + 'static,
    {
        self.inner.feed.subscribe(queue, callback)
    }

    /// Removes a snapshot callback. Returns false if it was not registered.
    pub fn unsubscribe_from_changes(&self, token: SubscriptionToken) -> bool {
        self.inner.feed.unsubscribe(token)
    }
}

impl<E: Recordable> Drop for RemotePoller<E> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            self.lifecycle.deregister(driver.lifecycle_token);
            self.inner.gateway.unsubscribe_from_changes(driver.gateway_token);
            driver.task.abort();
        }
    }
}

impl<E: Recordable> fmt::Debug for RemotePoller<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePoller")
            .field("record_type", &E::RECORD_TYPE)
            .field("running", &self.is_running())
            .field("entities", &self.inner.entities.read().len())
            .field("pull_interval", &self.pull_interval)
            .finish()
    }
}

async fn drive<E: Recordable>(
    inner: Arc<PollerInner<E>>,
    pull_interval: Duration,
    mut triggers: mpsc::UnboundedReceiver<Trigger>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = interval(pull_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let trigger = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => Trigger::Timer,
            Some(trigger) = triggers.recv() => trigger,
        };
        if inner.debug_logging {
            debug!(record_type = E::RECORD_TYPE, ?trigger, "refresh triggered");
        }
        // Failures are logged by refresh; the next trigger retries.
        let _ = inner.refresh().await;
    }
}
