//! Remote store abstraction.
//!
//! This module defines the `RemoteStore` trait: the row-oriented data service
//! a collection mirrors. It covers bulk reads, write-through mutations, and
//! change subscriptions. Subscriptions deliver events into a bounded channel
//! supplied by the caller rather than through callbacks, so the consumer
//! drains them in order and backpressure is explicit.

use crate::error::StoreResult;
use crate::event::ChangeEvent;
use crate::filter::Filter;
use crate::query::Query;
use crate::record::{Fields, OwnerId, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Channel a store pushes change events into.
///
/// The store closes the stream by dropping the sender. A consumer that sees
/// the channel close without having unsubscribed treats it as a dropped
/// connection.
pub type EventSink = mpsc::Sender<ChangeEvent>;

/// Identifier of an open subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Allocate a process-unique subscription ID.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SubscriptionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An open change stream for one table and filter.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub table: String,
    pub filter: Filter,
}

impl SubscriptionHandle {
    /// Create a handle with a fresh ID.
    pub fn new(table: impl Into<String>, filter: Filter) -> Self {
        Self {
            id: SubscriptionId::next(),
            table: table.into(),
            filter,
        }
    }
}

/// Trait for the remote data service a collection mirrors.
///
/// Implementations take `&self` so one store can be shared across sync
/// instances behind an `Arc`.
///
/// # Ordering
///
/// Events for one subscription must be pushed in the order the store
/// committed the changes. Nothing is promised across subscriptions.
///
/// # Example
///
/// ```ignore
/// use livesync::{MemoryStore, Query, RemoteStore};
///
/// let store = MemoryStore::new();
/// let rows = store.bulk_read(&Query::table("mentor_bookings")).await?;
/// ```
#[trait_variant::make(Send)]
pub trait RemoteStore: Send + Sync {
    /// Read the rows selected by `query`, filtered, ordered and bounded.
    async fn bulk_read(&self, query: &Query) -> StoreResult<Vec<Record>>;

    /// Insert a row, returning it as stored (with its ID and version).
    async fn insert(
        &self,
        table: &str,
        owner: Option<&OwnerId>,
        fields: Fields,
    ) -> StoreResult<Record>;

    /// Merge `fields` into an existing row, returning the stored row.
    async fn update(&self, table: &str, id: &RecordId, fields: Fields) -> StoreResult<Record>;

    /// Add `by` to an integer column as one atomic write, returning the
    /// stored row. A missing or null column counts as zero.
    ///
    /// Read-modify-write through `update` loses concurrent increments; this
    /// does not.
    async fn increment(
        &self,
        table: &str,
        id: &RecordId,
        field: &str,
        by: i64,
    ) -> StoreResult<Record>;

    /// Delete a row.
    async fn delete(&self, table: &str, id: &RecordId) -> StoreResult<()>;

    /// Open a change stream for rows of `table` matching `filter`.
    async fn subscribe(
        &self,
        table: &str,
        filter: &Filter,
        sink: EventSink,
    ) -> StoreResult<SubscriptionHandle>;

    /// Close a change stream. Closing an unknown or closed stream is a no-op.
    ///
    /// No event is pushed for the handle once this returns.
    fn unsubscribe(&self, handle: &SubscriptionHandle);
}
