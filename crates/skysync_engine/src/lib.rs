//! # skysync engine
//!
//! Keeps a local cache in step with a remote record collection.
//!
//! - [`RemotePoller`] holds an in-memory snapshot of one remote record type,
//!   refreshed on a timer, when the host returns to the foreground, and
//!   after every mutation through the [`RemoteGateway`](skysync_remote::RemoteGateway).
//! - [`ReconciliationEngine`] mirrors the poller's snapshots into a
//!   [`Cache`](skysync_storage::Cache), resolving conflicts by change date
//!   and pushing locally newer entities back to the remote store.
//! - [`GenericEntity`] is a schemaless entity for collections that do not
//!   warrant their own type.
//!
//! ## Example
//!
//! ```rust
//! use skysync_engine::{GenericEntity, LifecycleNotifier, ReconciliationEngine, SyncConfig};
//! use skysync_remote::{MemoryRemoteStore, RemoteGateway};
//! use skysync_storage::InMemoryCache;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(RemoteGateway::new(Arc::new(MemoryRemoteStore::new())));
//! let mut list = GenericEntity::new();
//! list.insert("title", "groceries");
//! gateway.create(&list).await?;
//!
//! let engine = ReconciliationEngine::generic(
//!     SyncConfig::new(),
//!     Arc::clone(&gateway),
//!     InMemoryCache::new(),
//!     Arc::new(LifecycleNotifier::new()),
//! )?;
//! engine.refresh().await?;
//! assert_eq!(engine.entities().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Everything is reported through `tracing`. Failures that the engine
//! absorbs (remote refresh errors, push-back failures, failed commits) are
//! logged at `warn`. Per-pass detail is logged at `debug` when
//! `debug_logging` is enabled in the configuration.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod generic;
mod lifecycle;
mod poller;
mod reconciler;
mod storable;

pub use config::{DeletionStrategy, PollerConfig, SyncConfig, DEFAULT_PULL_INTERVAL};
pub use error::{SyncError, SyncResult};
pub use generic::{generic_mapping, DataMap, DataValue, GenericEntity, GenericStorageModel};
pub use lifecycle::{
    LifecycleCallback, LifecycleEvent, LifecycleFilter, LifecycleNotifier, LifecycleSink,
    LifecycleSource, PlatformHooks,
};
pub use poller::RemotePoller;
pub use reconciler::{ReconcileReport, ReconciliationEngine};
pub use storable::{FieldMapping, Storable};
