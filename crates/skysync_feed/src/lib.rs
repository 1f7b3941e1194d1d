//! # skysync feed
//!
//! Change subscriptions for skysync.
//!
//! Every component that owns a snapshot (the remote poller, the
//! reconciliation engine) and every component that broadcasts coarse events
//! (the remote gateway, the lifecycle notifier) fans out through the same
//! primitive:
//!
//! - [`DeliveryQueue`] - a serial executor that callbacks run on
//! - [`SubscriberList`] - a token-keyed list of `(queue, callback)` pairs
//! - [`SnapshotFeed`] - a subscriber list that always delivers the complete
//!   current list, never a diff
//!
//! ## Delivery guarantees
//!
//! - Each `notify`/`publish` reaches every subscriber exactly once
//! - Deliveries to one subscriber keep publish order
//! - No ordering is promised across different subscribers
//!
//! ## Example
//!
//! ```rust
//! use skysync_feed::{DeliveryQueue, SnapshotFeed};
//! use std::sync::Arc;
//!
//! let feed: SnapshotFeed<u32> = SnapshotFeed::new();
//! let token = feed.subscribe(DeliveryQueue::immediate(), |list| {
//!     assert_eq!(&*list, &[1, 2, 3]);
//! });
//! feed.publish(Arc::from(vec![1, 2, 3]));
//! assert!(feed.unsubscribe(token));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod queue;
mod snapshot;
mod subscribers;

pub use queue::DeliveryQueue;
pub use snapshot::SnapshotFeed;
pub use subscribers::{SubscriberList, SubscriptionToken};
