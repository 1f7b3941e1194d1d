//! Whole-list snapshot feeds.

use crate::queue::DeliveryQueue;
use crate::subscribers::{SubscriberList, SubscriptionToken};
use std::fmt;
use std::sync::Arc;

/// Fans a complete snapshot out to subscribers.
///
/// Every publish shares one `Arc<[T]>` between all subscribers, so each
/// callback sees the identical list. Subscribers never receive deltas.
pub struct SnapshotFeed<T> {
    subscribers: SubscriberList<Arc<[T]>>,
}

impl<T> SnapshotFeed<T>
where
    T: Send + Sync + 'static,
{
    /// Creates a feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: SubscriberList::new(),
        }
    }

    /// Registers a callback delivered on `queue` with each new snapshot.
    pub fn subscribe<F>(&self, queue: DeliveryQueue, callback: F) -> SubscriptionToken
    where
        F: Fn(Arc<[T]>) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(queue, callback)
    }

    /// Removes a callback. Returns false if the token was not registered.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.unsubscribe(token)
    }

    /// Delivers the full snapshot to every subscriber.
    pub fn publish(&self, snapshot: Arc<[T]>) {
        self.subscribers.notify(snapshot);
    }

    /// Returns the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Removes every subscriber.
    pub fn clear(&self) {
        self.subscribers.clear();
    }
}

impl<T> Default for SnapshotFeed<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SnapshotFeed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotFeed")
            .field("subscribers", &self.subscribers)
            .finish()
    }
}
