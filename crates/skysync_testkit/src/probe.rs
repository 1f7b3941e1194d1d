//! Awaiting snapshot notifications.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long [`SnapshotProbe::next`] waits by default.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Collects published snapshots into a channel.
///
/// Register [`callback`](Self::callback) with a poller or engine, then await
/// [`next`](Self::next).
pub struct SnapshotProbe<T> {
    tx: mpsc::UnboundedSender<Arc<[T]>>,
    rx: mpsc::UnboundedReceiver<Arc<[T]>>,
}

impl<T: Send + Sync + 'static> SnapshotProbe<T> {
    /// Creates an empty probe.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Returns a subscriber callback feeding this probe.
    pub fn callback(&self) -> impl Fn(Arc<[T]>) + Send + Sync + 'static {
        let tx = self.tx.clone();
        move |snapshot| {
            let _ = tx.send(snapshot);
        }
    }

    /// Waits up to [`PROBE_TIMEOUT`] for the next snapshot.
    pub async fn next(&mut self) -> Option<Arc<[T]>> {
        self.next_within(PROBE_TIMEOUT).await
    }

    /// Waits up to `limit` for the next snapshot.
    pub async fn next_within(&mut self, limit: Duration) -> Option<Arc<[T]>> {
        tokio::time::timeout(limit, self.rx.recv()).await.ok().flatten()
    }

    /// Returns a snapshot already delivered, without waiting.
    pub fn try_next(&mut self) -> Option<Arc<[T]>> {
        self.rx.try_recv().ok()
    }

    /// Takes every snapshot already delivered.
    pub fn drain(&mut self) -> Vec<Arc<[T]>> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl<T: Send + Sync + 'static> Default for SnapshotProbe<T> {
    fn default() -> Self {
        Self::new()
    }
}
