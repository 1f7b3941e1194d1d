//! # skysync storage
//!
//! The local persisted cache that the reconciliation engine mirrors remote
//! records into.
//!
//! A cache is a transactional mapping from a unique key to a storage model.
//! Mutations are staged and only become visible to other openers (and
//! durable, for file caches) on [`Cache::commit`].
//!
//! ## Available caches
//!
//! - [`InMemoryCache`] - For testing and ephemeral mirrors
//! - [`FileCache`] - A locked directory holding one CBOR file, replaced
//!   atomically on every commit
//!
//! ## Example
//!
//! ```rust
//! use chrono::{DateTime, Utc};
//! use skysync_storage::{Cache, InMemoryCache, StorageModel};
//!
//! #[derive(Clone)]
//! struct Row {
//!     key: String,
//!     changed: DateTime<Utc>,
//! }
//!
//! impl StorageModel for Row {
//!     fn key(&self) -> &str {
//!         &self.key
//!     }
//!     fn change_date(&self) -> DateTime<Utc> {
//!         self.changed
//!     }
//!     fn set_change_date(&mut self, date: DateTime<Utc>) {
//!         self.changed = date;
//!     }
//! }
//!
//! let mut cache = InMemoryCache::new();
//! cache.insert(Row { key: "a".into(), changed: Utc::now() }).unwrap();
//! assert!(cache.has_changes());
//! cache.commit().unwrap();
//! assert_eq!(cache.fetch_all().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod file;
mod memory;
mod model;
mod staging;

pub use cache::Cache;
pub use error::{CacheError, CacheResult};
pub use file::FileCache;
pub use memory::InMemoryCache;
pub use model::StorageModel;
