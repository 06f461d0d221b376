//! Live mirroring of remote tables into in-memory collections.
//!
//! This crate keeps a local, ordered collection of records consistent with a
//! filtered slice of a remote table. A collection is populated by one bulk read
//! and then kept current by folding the table's change stream into it, in the
//! order the remote store emits changes.
//!
//! # Modules
//!
//! - `record`: Record identifiers, owners and the record type itself
//! - `event`: Change events delivered by a subscription
//! - `filter`: Predicates scoping which rows a collection mirrors
//! - `query`: Table, filter, ordering and limit of a mirrored slice
//! - `collection`: The in-memory collection and its event-folding rules
//! - `store`: The `RemoteStore` trait the sync engine talks to
//! - `memory_store`: An in-memory `RemoteStore` with fault injection
//! - `sync`: `RemoteCollectionSync`, the load/subscribe/mutate lifecycle
//! - `status`: Lifecycle state and staleness reporting
//! - `config`: Buffering and reconnection settings
//! - `schema`: Schema-validated typed views over records
//! - `error`: Error types for the crate
//!
//! # Example
//!
//! ```
//! use livesync::{Filter, MemoryStore, OwnerId, Query, RemoteCollectionSync, SyncConfig};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), livesync::SyncError> {
//! let store = Arc::new(MemoryStore::new());
//! let sync = RemoteCollectionSync::new(Arc::clone(&store), SyncConfig::default());
//!
//! let query = Query::table("mood_entries")
//!     .filter(Filter::owner(OwnerId::new("user-1")))
//!     .newest_first()
//!     .limit(10);
//!
//! let entries = sync.activate(query).await?;
//! assert!(entries.is_empty());
//! assert!(!entries.is_loading());
//!
//! sync.deactivate();
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod memory_store;
pub mod query;
pub mod record;
pub mod schema;
pub mod status;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use collection::{Applied, Collection, IgnoreReason};
pub use config::{ReconnectPolicy, SyncConfig};
pub use error::{SchemaError, StoreError, StoreResult, SyncError, SyncResult};
pub use event::{ChangeEvent, ChangeKind};
pub use filter::Filter;
pub use memory_store::{MemoryStore, CREATED_AT};
pub use query::{Direction, OrderBy, OrderKey, Query};
pub use record::{Fields, OwnerId, Record, RecordId};
pub use schema::{Entity, FieldReader, RowShape};
pub use status::{SyncState, SyncStatus};
pub use store::{EventSink, RemoteStore, SubscriptionHandle, SubscriptionId};
pub use sync::{CollectionHandle, Mutated, Mutation, RemoteCollectionSync};
