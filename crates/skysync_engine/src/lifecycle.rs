//! Application lifecycle signals.
//!
//! Pollers listen for [`LifecycleEvent::WillEnterForeground`] to refresh
//! when the host comes back to the foreground. The source is injected as a
//! [`LifecycleSource`] trait object so tests can drive it by hand.

use parking_lot::Mutex;
use skysync_feed::{DeliveryQueue, SubscriberList, SubscriptionToken};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// A coarse application lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The application moved to the background.
    DidEnterBackground,
    /// The application is about to return to the foreground.
    WillEnterForeground,
    /// The application finished launching.
    DidFinishLaunching,
    /// The application became active.
    DidBecomeActive,
    /// The application is about to become inactive.
    WillResignActive,
    /// The application is about to terminate.
    WillTerminate,
    /// The system reported memory pressure.
    DidReceiveMemoryWarning,
    /// The wall clock changed significantly.
    SignificantTimeChange,
}

impl LifecycleEvent {
    /// Every event kind.
    pub const ALL: [LifecycleEvent; 8] = [
        LifecycleEvent::DidEnterBackground,
        LifecycleEvent::WillEnterForeground,
        LifecycleEvent::DidFinishLaunching,
        LifecycleEvent::DidBecomeActive,
        LifecycleEvent::WillResignActive,
        LifecycleEvent::WillTerminate,
        LifecycleEvent::DidReceiveMemoryWarning,
        LifecycleEvent::SignificantTimeChange,
    ];
}

/// Which events a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleFilter {
    /// Every event.
    All,
    /// One event kind.
    Only(LifecycleEvent),
}

impl LifecycleFilter {
    /// Returns true if `event` passes this filter.
    pub fn matches(self, event: LifecycleEvent) -> bool {
        match self {
            LifecycleFilter::All => true,
            LifecycleFilter::Only(kind) => kind == event,
        }
    }
}

/// Callback invoked for lifecycle events.
pub type LifecycleCallback = Box<dyn Fn(LifecycleEvent) + Send + Sync + 'static>;

/// A dispatcher of lifecycle events.
pub trait LifecycleSource: Send + Sync {
    /// Registers `callback` for events passing `filter`.
    fn register(&self, filter: LifecycleFilter, callback: LifecycleCallback) -> SubscriptionToken;

    /// Removes a listener. Returns false if it was not registered.
    fn deregister(&self, handle: SubscriptionToken) -> bool;
}

/// Connection to the platform's own lifecycle notifications.
///
/// `attach` is called when the first listener registers and `detach` when
/// the notifier shuts down or is dropped. Implementations forward platform
/// events through the given [`LifecycleSink`].
pub trait PlatformHooks: Send + Sync {
    /// Starts observing platform notifications.
    fn attach(&self, sink: LifecycleSink);

    /// Stops observing platform notifications.
    fn detach(&self);
}

/// Handle through which platform hooks deliver events.
///
/// The sink does not keep its notifier alive; events sent after the notifier
/// is gone are dropped.
#[derive(Clone)]
pub struct LifecycleSink {
    target: Weak<NotifierInner>,
}

impl LifecycleSink {
    /// Forwards an event to every matching listener.
    pub fn emit(&self, event: LifecycleEvent) {
        if let Some(inner) = self.target.upgrade() {
            inner.listeners.notify(event);
        }
    }
}

impl fmt::Debug for LifecycleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleSink")
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}

struct NotifierInner {
    listeners: SubscriberList<LifecycleEvent>,
    hooks: Option<Box<dyn PlatformHooks>>,
    attached: Mutex<bool>,
}

impl NotifierInner {
    fn detach(&self) {
        let mut attached = self.attached.lock();
        if *attached {
            if let Some(hooks) = &self.hooks {
                hooks.detach();
            }
            *attached = false;
            debug!("lifecycle notifier detached from platform");
        }
    }
}

impl Drop for NotifierInner {
    fn drop(&mut self) {
        self.detach();
    }
}

/// The standard [`LifecycleSource`].
///
/// Handles are cheap to clone and share one listener list. Platform hooks,
/// if any, are attached lazily on the first registration. Hosts without
/// hooks forward events with [`LifecycleNotifier::emit`].
///
/// # Example
///
/// ```rust
/// use skysync_engine::{LifecycleEvent, LifecycleFilter, LifecycleNotifier, LifecycleSource};
///
/// let notifier = LifecycleNotifier::new();
/// let handle = notifier.register(
///     LifecycleFilter::Only(LifecycleEvent::WillEnterForeground),
///     Box::new(|event| println!("{event:?}")),
/// );
/// notifier.emit(LifecycleEvent::WillEnterForeground);
/// assert!(notifier.deregister(handle));
/// ```
#[derive(Clone)]
pub struct LifecycleNotifier {
    inner: Arc<NotifierInner>,
}

impl LifecycleNotifier {
    /// Creates a notifier with no platform wiring.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a notifier that attaches `hooks` on first registration.
    pub fn with_hooks(hooks: impl PlatformHooks + 'static) -> Self {
        Self::build(Some(Box::new(hooks)))
    }

    fn build(hooks: Option<Box<dyn PlatformHooks>>) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                listeners: SubscriberList::new(),
                hooks,
                attached: Mutex::new(false),
            }),
        }
    }

    /// Returns the process-wide notifier, creating it on first use.
    pub fn shared() -> LifecycleNotifier {
        static SHARED: OnceLock<LifecycleNotifier> = OnceLock::new();
        SHARED.get_or_init(LifecycleNotifier::new).clone()
    }

    /// Registers a callback delivered on `queue`.
    pub fn register_on(
        &self,
        queue: DeliveryQueue,
        filter: LifecycleFilter,
        callback: LifecycleCallback,
    ) -> SubscriptionToken {
        self.attach();
        self.inner.listeners.subscribe(queue, move |event| {
            if filter.matches(event) {
                callback(event);
            }
        })
    }

    /// Delivers `event` to every matching listener.
    pub fn emit(&self, event: LifecycleEvent) {
        self.inner.listeners.notify(event);
    }

    /// Returns a sink that forwards into this notifier.
    pub fn sink(&self) -> LifecycleSink {
        LifecycleSink {
            target: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Returns true while platform hooks are attached.
    pub fn is_attached(&self) -> bool {
        *self.inner.attached.lock()
    }

    /// Removes every listener and detaches from the platform.
    ///
    /// A later registration attaches again.
    pub fn shutdown(&self) {
        self.inner.listeners.clear();
        self.inner.detach();
    }

    fn attach(&self) {
        let mut attached = self.inner.attached.lock();
        if *attached {
            return;
        }
        if let Some(hooks) = &self.inner.hooks {
            hooks.attach(self.sink());
            debug!("lifecycle notifier attached to platform");
        }
        *attached = true;
    }
}

impl Default for LifecycleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSource for LifecycleNotifier {
    fn register(&self, filter: LifecycleFilter, callback: LifecycleCallback) -> SubscriptionToken {
        self.register_on(DeliveryQueue::immediate(), filter, callback)
    }

    fn deregister(&self, handle: SubscriptionToken) -> bool {
        self.inner.listeners.unsubscribe(handle)
    }
}

impl fmt::Debug for LifecycleNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleNotifier")
            .field("listeners", &self.listener_count())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeHooks {
        attaches: Arc<AtomicUsize>,
        detaches: Arc<AtomicUsize>,
        sink: Arc<Mutex<Option<LifecycleSink>>>,
    }

    impl PlatformHooks for FakeHooks {
        fn attach(&self, sink: LifecycleSink) {
            self.attaches.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock() = Some(sink);
        }

        fn detach(&self) {
            self.detaches.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> (Arc<AtomicUsize>, LifecycleCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn filters_by_event_kind() {
        let notifier = LifecycleNotifier::new();
        let (foreground, cb) = counter();
        notifier.register(LifecycleFilter::Only(LifecycleEvent::WillEnterForeground), cb);
        let (all, cb) = counter();
        notifier.register(LifecycleFilter::All, cb);

        for event in LifecycleEvent::ALL {
            notifier.emit(event);
        }
        assert_eq!(foreground.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn deregister_stops_delivery() {
        let notifier = LifecycleNotifier::new();
        let (count, cb) = counter();
        let handle = notifier.register(LifecycleFilter::All, cb);

        assert!(notifier.deregister(handle));
        assert!(!notifier.deregister(handle));
        notifier.emit(LifecycleEvent::WillTerminate);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn hooks_attach_lazily_and_detach_on_shutdown() {
        let hooks = FakeHooks::default();
        let attaches = hooks.attaches.clone();
        let detaches = hooks.detaches.clone();
        let sink = hooks.sink.clone();

        let notifier = LifecycleNotifier::with_hooks(hooks);
        assert!(!notifier.is_attached());
        assert_eq!(attaches.load(Ordering::SeqCst), 0);

        let (count, cb) = counter();
        notifier.register(LifecycleFilter::All, cb);
        let (_, cb) = counter();
        notifier.register(LifecycleFilter::All, cb);
        assert!(notifier.is_attached());
        assert_eq!(attaches.load(Ordering::SeqCst), 1);

        let platform = sink.lock().clone().unwrap();
        platform.emit(LifecycleEvent::DidBecomeActive);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        notifier.shutdown();
        assert!(!notifier.is_attached());
        assert_eq!(notifier.listener_count(), 0);
        assert_eq!(detaches.load(Ordering::SeqCst), 1);

        platform.emit(LifecycleEvent::DidBecomeActive);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_last_handle_detaches() {
        let hooks = FakeHooks::default();
        let detaches = hooks.detaches.clone();
        let sink = hooks.sink.clone();

        let notifier = LifecycleNotifier::with_hooks(hooks);
        let (_, cb) = counter();
        notifier.register(LifecycleFilter::All, cb);
        drop(notifier);

        assert_eq!(detaches.load(Ordering::SeqCst), 1);
        let platform = sink.lock().clone().unwrap();
        platform.emit(LifecycleEvent::WillTerminate);
    }

    #[test]
    fn shared_is_one_instance() {
        let a = LifecycleNotifier::shared();
        let b = LifecycleNotifier::shared();
        let (count, cb) = counter();
        let handle = a.register(LifecycleFilter::Only(LifecycleEvent::SignificantTimeChange), cb);
        b.emit(LifecycleEvent::SignificantTimeChange);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(b.deregister(handle));
    }
}
