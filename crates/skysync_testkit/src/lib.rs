//! # skysync testkit
//!
//! Test utilities for skysync.
//!
//! This crate provides:
//! - [`Note`], a small storable entity with a typed storage model
//! - [`Harness`], an in-memory remote store, gateway and lifecycle notifier
//!   wired together
//! - [`SnapshotProbe`], a channel-backed subscriber for awaiting snapshots
//! - Property-based generators for reconciliation scenarios
//!
//! ## Usage
//!
//! ```rust,ignore
//! use skysync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn mirrors_remote_notes() {
//!     let harness = Harness::new();
//!     harness.seed(&Note::dated("n1", "remote", at(100)));
//!
//!     let engine = harness.note_engine(SyncConfig::new(), InMemoryCache::new());
//!     engine.refresh().await.unwrap();
//!     assert_eq!(engine.entities().len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod note;
pub mod probe;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::note::*;
    pub use crate::probe::*;
    pub use skysync_engine::{DeletionStrategy, ReconciliationEngine, Storable, SyncConfig};
    pub use skysync_storage::InMemoryCache;
}

pub use fixtures::*;
pub use generators::*;
pub use note::*;
pub use probe::*;
