//! Configuration for pollers and reconciliation engines.

use crate::error::{SyncError, SyncResult};
use skysync_remote::Predicate;
use std::path::PathBuf;
use std::time::Duration;

/// Default interval between scheduled remote pulls.
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// What a reconciliation pass does with cached models that are missing from
/// the remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionStrategy {
    /// Keep them.
    Ignore,
    /// Delete them from the cache.
    #[default]
    Remove,
}

/// Configuration for a [`crate::RemotePoller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Filter for the remote snapshot.
    pub predicate: Predicate,
    /// Interval between scheduled refreshes.
    pub pull_interval: Duration,
    /// Emit per-refresh debug logs.
    pub debug_logging: bool,
}

impl PollerConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            predicate: Predicate::All,
            pull_interval: DEFAULT_PULL_INTERVAL,
            debug_logging: false,
        }
    }

    /// Sets the snapshot predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Sets the pull interval.
    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = interval;
        self
    }

    /// Enables or disables debug logging.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if the pull interval is zero.
    pub fn validate(&self) -> SyncResult<()> {
        if self.pull_interval.is_zero() {
            return Err(SyncError::Config("pull interval must be positive".into()));
        }
        Ok(())
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a [`crate::ReconciliationEngine`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory for a file-backed cache. Required by
    /// [`ReconciliationEngine::open`](crate::ReconciliationEngine::open).
    pub cache_path: Option<PathBuf>,
    /// Handling of cached models missing remotely.
    pub deletion_strategy: DeletionStrategy,
    /// Filter for the remote snapshot.
    pub predicate: Predicate,
    /// Interval between scheduled remote pulls.
    pub pull_interval: Duration,
    /// Emit per-pass debug logs.
    pub debug_logging: bool,
}

impl SyncConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            cache_path: None,
            deletion_strategy: DeletionStrategy::default(),
            predicate: Predicate::All,
            pull_interval: DEFAULT_PULL_INTERVAL,
            debug_logging: false,
        }
    }

    /// Sets the cache directory.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Sets the deletion strategy.
    pub fn with_deletion_strategy(mut self, strategy: DeletionStrategy) -> Self {
        self.deletion_strategy = strategy;
        self
    }

    /// Sets the snapshot predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Sets the pull interval.
    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = interval;
        self
    }

    /// Enables or disables debug logging.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Derives the configuration of the engine's poller.
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::new()
            .with_predicate(self.predicate.clone())
            .with_pull_interval(self.pull_interval)
            .with_debug_logging(self.debug_logging)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if the pull interval is zero.
    pub fn validate(&self) -> SyncResult<()> {
        self.poller_config().validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.pull_interval, Duration::from_secs(300));
        assert_eq!(config.deletion_strategy, DeletionStrategy::Remove);
        assert!(!config.debug_logging);
        assert!(config.cache_path.is_none());
        assert_eq!(config.predicate, Predicate::All);
    }

    #[test]
    fn builder_carries_into_poller_config() {
        let config = SyncConfig::new()
            .with_pull_interval(Duration::from_secs(30))
            .with_debug_logging(true)
            .with_predicate(Predicate::exists("title"))
            .with_deletion_strategy(DeletionStrategy::Ignore)
            .with_cache_path("/tmp/notes");

        let poller = config.poller_config();
        assert_eq!(poller.pull_interval, Duration::from_secs(30));
        assert!(poller.debug_logging);
        assert_eq!(poller.predicate, Predicate::exists("title"));
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/notes")));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = SyncConfig::new().with_pull_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
        assert!(SyncConfig::new().validate().is_ok());
    }
}
