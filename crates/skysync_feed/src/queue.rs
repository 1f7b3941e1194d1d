//! Delivery queues for subscriber callbacks.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The context a subscriber's callbacks run on.
///
/// A queue is a serial executor: jobs dispatched to one queue run one at a
/// time, in dispatch order. Cloning a queue yields another handle to the same
/// executor, so several subscriptions can share one ordered context.
#[derive(Clone)]
pub struct DeliveryQueue {
    kind: QueueKind,
}

#[derive(Clone)]
enum QueueKind {
    Immediate,
    Serial(mpsc::UnboundedSender<Job>),
}

impl DeliveryQueue {
    /// Runs jobs inline on the dispatching context.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            kind: QueueKind::Immediate,
        }
    }

    /// Creates a serial queue backed by a task on the current Tokio runtime.
    ///
    /// Outside a runtime there is nothing to spawn on, and the queue falls
    /// back to [`DeliveryQueue::immediate`].
    #[must_use]
    pub fn serial() -> Self {
        match Handle::try_current() {
            Ok(handle) => Self::serial_on(&handle),
            Err(_) => {
                debug!("no tokio runtime available, delivering inline");
                Self::immediate()
            }
        }
    }

    /// Creates a serial queue backed by a task on the given runtime.
    ///
    /// The worker task exits once every handle to the queue is dropped.
    #[must_use]
    pub fn serial_on(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                // A panicking callback must not take the other subscribers
                // sharing this queue down with it.
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("subscriber callback panicked");
                }
            }
        });
        Self {
            kind: QueueKind::Serial(tx),
        }
    }

    /// Returns true if jobs run inline.
    pub fn is_immediate(&self) -> bool {
        matches!(self.kind, QueueKind::Immediate)
    }

    /// Submits a job to the queue.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.kind {
            QueueKind::Immediate => job(),
            QueueKind::Serial(tx) => {
                if tx.send(Box::new(job)).is_err() {
                    warn!("delivery queue worker has stopped, dropping job");
                }
            }
        }
    }
}

impl fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QueueKind::Immediate => f.write_str("DeliveryQueue::Immediate"),
            QueueKind::Serial(_) => f.write_str("DeliveryQueue::Serial"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn immediate_runs_inline() {
        let queue = DeliveryQueue::immediate();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        queue.dispatch(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(queue.is_immediate());
    }

    #[test]
    fn serial_without_runtime_falls_back() {
        let queue = DeliveryQueue::serial();
        assert!(queue.is_immediate());
    }

    #[tokio::test]
    async fn serial_preserves_dispatch_order() {
        let queue = DeliveryQueue::serial();
        assert!(!queue.is_immediate());

        let (tx, mut rx) = mpsc::unbounded_channel();
        for i in 0..50 {
            let tx = tx.clone();
            queue.dispatch(move || {
                tx.send(i).unwrap();
            });
        }
        drop(tx);

        let mut received = Vec::new();
        while let Some(i) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
        {
            received.push(i);
        }
        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn serial_survives_panicking_job() {
        let queue = DeliveryQueue::serial();
        let (tx, mut rx) = mpsc::unbounded_channel();

        queue.dispatch(|| panic!("boom"));
        queue.dispatch(move || {
            tx.send(42).unwrap();
        });

        let value = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(value, Some(42));
    }
}
