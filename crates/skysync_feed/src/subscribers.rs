//! Token-keyed subscriber lists.

use crate::queue::DeliveryQueue;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies one registered callback.
///
/// Tokens are unique for the lifetime of the process and are the only
/// handle needed to unsubscribe.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(Uuid);

impl SubscriptionToken {
    /// Generates a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriptionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionToken({})", self.0)
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Callback<A> = Arc<dyn Fn(A) + Send + Sync + 'static>;

struct Subscriber<A> {
    token: SubscriptionToken,
    queue: DeliveryQueue,
    callback: Callback<A>,
}

/// A list of callbacks that all receive every notification.
///
/// The list is thread-safe. Its lock is released before any callback is
/// dispatched, so callbacks may subscribe or unsubscribe re-entrantly.
pub struct SubscriberList<A> {
    subscribers: RwLock<Vec<Subscriber<A>>>,
}

impl<A> SubscriberList<A>
where
    A: Clone + Send + 'static,
{
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a callback delivered on `queue`.
    pub fn subscribe<F>(&self, queue: DeliveryQueue, callback: F) -> SubscriptionToken
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let token = SubscriptionToken::new();
        self.subscribers.write().push(Subscriber {
            token,
            queue,
            callback: Arc::new(callback),
        });
        token
    }

    /// Removes a callback. Returns false if the token was not registered.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.token != token);
        subscribers.len() != before
    }

    /// Delivers `payload` once to every current subscriber.
    pub fn notify(&self, payload: A) {
        let targets: Vec<(DeliveryQueue, Callback<A>)> = self
            .subscribers
            .read()
            .iter()
            .map(|s| (s.queue.clone(), Arc::clone(&s.callback)))
            .collect();

        for (queue, callback) in targets {
            let payload = payload.clone();
            queue.dispatch(move || callback(payload));
        }
    }

    /// Returns true if the token is registered.
    pub fn contains(&self, token: SubscriptionToken) -> bool {
        self.subscribers.read().iter().any(|s| s.token == token)
    }

    /// Returns the number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns true if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Removes every subscriber.
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}

impl<A> Default for SubscriberList<A>
where
    A: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for SubscriberList<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberList")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}
