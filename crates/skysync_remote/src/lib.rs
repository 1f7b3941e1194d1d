//! # skysync remote
//!
//! Typed access to a remote record database.
//!
//! The remote database itself is reached through the [`RemoteStore`] trait:
//! an object-safe, asynchronous contract for fetching, saving, deleting and
//! querying [`Record`]s. Application types implement [`Recordable`] to map
//! themselves onto records, and [`RemoteGateway`] turns raw store calls into
//! typed operations with a closed error taxonomy.
//!
//! ## Batches
//!
//! `save_all` and `delete_all` return one result per input. A single failing
//! item never fails the others.
//!
//! ## Queries
//!
//! [`Predicate`]s are declarative filter expressions. `get_all` follows
//! continuation cursors until the result set is exhausted and concatenates
//! pages in server order.
//!
//! ## Testing
//!
//! [`MemoryRemoteStore`] is a complete in-memory store with server change
//! tags, pagination, fault injection and call counters.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod gateway;
mod memory;
mod predicate;
mod record;
mod recordable;
mod store;

pub use error::{GatewayError, GatewayResult, StoreError, StoreErrorKind, StoreResult};
pub use gateway::RemoteGateway;
pub use memory::{MemoryRemoteStore, StoreStats, DEFAULT_PAGE_SIZE, MAX_OPEN_CURSORS};
pub use predicate::{Comparison, Predicate, Query};
pub use record::{FieldMap, FieldValue, Record, RecordId};
pub use recordable::Recordable;
pub use store::{Cursor, ModifyOutcome, QueryPage, RemoteStore, SavePolicy};
