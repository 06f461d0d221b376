//! In-memory remote store implementation.
//!
//! This module provides `MemoryStore`, an in-memory implementation of the
//! `RemoteStore` trait. It's intended for development and tests: it assigns
//! versions, fans change events out to matching subscriptions in commit
//! order, and lets tests inject failures and connection drops.
//!
//! # Features
//!
//! - Monotonic row versions, even for writes within one clock tick
//! - `created_at` stamped once on insert, like a column defaulting to `now()`
//! - Atomic counter increments
//! - Filtered fan-out (updates reach subscribers the row enters or leaves)
//! - Slow consumers whose buffer is full are disconnected and must resync
//! - Fault injection for reads, writes and subscribes
//! - Delivery can be paused to hold echo events back
//!
//! # Example
//!
//! ```ignore
//! use livesync::{MemoryStore, RemoteStore, Query};
//!
//! let store = MemoryStore::new();
//! let row = store.insert("mood_entries", Some(&owner), fields).await?;
//! let rows = store.bulk_read(&Query::table("mood_entries")).await?;
//! ```

use crate::error::{StoreError, StoreResult};
use crate::event::ChangeEvent;
use crate::filter::Filter;
use crate::query::Query;
use crate::record::{Fields, OwnerId, Record, RecordId};
use crate::store::{EventSink, RemoteStore, SubscriptionHandle};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;

/// Column stamped with the insert time when an insert does not supply it
pub const CREATED_AT: &str = "created_at";

/// Fixed-width RFC 3339, so stamps order correctly as strings
fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

struct Subscriber {
    handle: SubscriptionHandle,
    sink: EventSink,
}

impl Subscriber {
    /// Whether a change to a row of this table concerns the subscriber.
    fn wants(&self, event: &ChangeEvent, old: Option<&Record>) -> bool {
        let filter = &self.handle.filter;
        let old_matches = old.map(|row| filter.matches(row));
        match event {
            ChangeEvent::Insert(row) => filter.matches(row),
            ChangeEvent::Update(row) => filter.matches(row) || old_matches.unwrap_or(false),
            ChangeEvent::Delete(_) => old_matches.unwrap_or(true),
        }
    }
}

/// A change waiting for delivery while delivery is paused.
struct HeldChange {
    table: String,
    event: ChangeEvent,
    old: Option<Record>,
}

#[derive(Default)]
struct Faults {
    reads: VecDeque<StoreError>,
    writes: VecDeque<StoreError>,
    subscribes: VecDeque<StoreError>,
}

#[derive(Default)]
struct StoreState {
    /// Rows per table, in insertion order
    tables: HashMap<String, Vec<Record>>,
    subscribers: Vec<Subscriber>,
    last_version: Option<DateTime<Utc>>,
    paused: bool,
    held: VecDeque<HeldChange>,
    faults: Faults,
}

impl StoreState {
    fn next_version(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let version = match self.last_version {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_version = Some(version);
        version
    }

    fn publish(&mut self, table: &str, event: ChangeEvent, old: Option<Record>) {
        if self.paused {
            self.held.push_back(HeldChange {
                table: table.to_string(),
                event,
                old,
            });
            return;
        }
        self.deliver(table, &event, old.as_ref());
    }

    fn deliver(&mut self, table: &str, event: &ChangeEvent, old: Option<&Record>) {
        self.subscribers.retain(|sub| {
            if sub.handle.table != table || !sub.wants(event, old) {
                return true;
            }
            match sub.sink.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Subscriber {} on {} fell behind, disconnecting",
                        sub.handle.id,
                        table
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }

    fn rows_mut(&mut self, table: &str) -> &mut Vec<Record> {
        self.tables.entry(table.to_string()).or_default()
    }
}

/// In-memory implementation of `RemoteStore`
///
/// All state sits behind one mutex. Every write publishes its change while
/// still holding the lock, so each subscription sees changes in commit order.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put rows into a table without publishing events
    pub fn seed(&self, table: &str, records: impl IntoIterator<Item = Record>) {
        let mut state = self.state();
        for record in records {
            if state.last_version.map_or(true, |last| record.version > last) {
                state.last_version = Some(record.version);
            }
            let rows = state.rows_mut(table);
            rows.retain(|row| row.id != record.id);
            rows.push(record);
        }
    }

    /// Snapshot of a table's rows in insertion order
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Look up one row
    pub fn row(&self, table: &str, id: &RecordId) -> Option<Record> {
        self.state()
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| &row.id == id).cloned())
    }

    /// Publish an arbitrary event without touching stored rows
    pub fn emit(&self, table: &str, event: ChangeEvent) {
        self.state().publish(table, event, None);
    }

    /// Make the next bulk read fail with `err`
    pub fn fail_next_read(&self, err: StoreError) {
        self.state().faults.reads.push_back(err);
    }

    /// Make the next insert, update or delete fail with `err`
    pub fn fail_next_write(&self, err: StoreError) {
        self.state().faults.writes.push_back(err);
    }

    /// Make the next subscribe fail with `err`
    pub fn fail_next_subscribe(&self, err: StoreError) {
        self.state().faults.subscribes.push_back(err);
    }

    /// Close every open change stream, as a lost connection would
    pub fn drop_subscriptions(&self) {
        let dropped = std::mem::take(&mut self.state().subscribers);
        tracing::debug!("Dropping {} subscriptions", dropped.len());
    }

    /// Number of open change streams for a table
    pub fn subscriber_count(&self, table: &str) -> usize {
        self.state()
            .subscribers
            .iter()
            .filter(|sub| sub.handle.table == table)
            .count()
    }

    /// Hold back change events until `resume_delivery`
    pub fn pause_delivery(&self) {
        self.state().paused = true;
    }

    /// Deliver held events in commit order and resume live delivery
    pub fn resume_delivery(&self) {
        let mut state = self.state();
        state.paused = false;
        while let Some(change) = state.held.pop_front() {
            state.deliver(&change.table, &change.event, change.old.as_ref());
        }
    }
}

impl RemoteStore for MemoryStore {
    async fn bulk_read(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let mut state = self.state();
        if let Some(err) = state.faults.reads.pop_front() {
            return Err(err);
        }
        Ok(state
            .tables
            .get(&query.table)
            .map(|rows| query.select(rows))
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        table: &str,
        owner: Option<&OwnerId>,
        mut fields: Fields,
    ) -> StoreResult<Record> {
        let mut state = self.state();
        if let Some(err) = state.faults.writes.pop_front() {
            return Err(err);
        }

        let version = state.next_version();
        fields
            .entry(CREATED_AT.to_string())
            .or_insert_with(|| timestamp(version));
        let record = Record::new(RecordId::generate(), owner.cloned(), fields, version);
        state.rows_mut(table).push(record.clone());
        state.publish(table, ChangeEvent::Insert(record.clone()), None);
        Ok(record)
    }

    async fn update(&self, table: &str, id: &RecordId, fields: Fields) -> StoreResult<Record> {
        let mut state = self.state();
        if let Some(err) = state.faults.writes.pop_front() {
            return Err(err);
        }

        let version = state.next_version();
        let rows = state.rows_mut(table);
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        let old = row.clone();
        row.merge_fields(fields);
        row.version = version;
        let updated = row.clone();

        state.publish(table, ChangeEvent::Update(updated.clone()), Some(old));
        Ok(updated)
    }

    async fn increment(
        &self,
        table: &str,
        id: &RecordId,
        field: &str,
        by: i64,
    ) -> StoreResult<Record> {
        let mut state = self.state();
        if let Some(err) = state.faults.writes.pop_front() {
            return Err(err);
        }

        let version = state.next_version();
        let rows = state.rows_mut(table);
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        let current = match row.field(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                StoreError::Rejected(format!("{}.{} is not an integer column", table, field))
            })?,
        };
        let next = current.checked_add(by).ok_or_else(|| {
            StoreError::Rejected(format!("{}.{} would overflow", table, field))
        })?;

        let old = row.clone();
        row.fields.insert(field.to_string(), Value::from(next));
        row.version = version;
        let updated = row.clone();

        state.publish(table, ChangeEvent::Update(updated.clone()), Some(old));
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &RecordId) -> StoreResult<()> {
        let mut state = self.state();
        if let Some(err) = state.faults.writes.pop_front() {
            return Err(err);
        }

        let rows = state.rows_mut(table);
        let pos = rows
            .iter()
            .position(|row| &row.id == id)
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        let old = rows.remove(pos);

        state.publish(table, ChangeEvent::Delete(id.clone()), Some(old));
        Ok(())
    }

    async fn subscribe(
        &self,
        table: &str,
        filter: &Filter,
        sink: EventSink,
    ) -> StoreResult<SubscriptionHandle> {
        let mut state = self.state();
        if let Some(err) = state.faults.subscribes.pop_front() {
            return Err(err);
        }

        let handle = SubscriptionHandle::new(table, filter.clone());
        tracing::debug!("Opened {} on {} ({})", handle.id, table, filter);
        state.subscribers.push(Subscriber {
            handle: handle.clone(),
            sink,
        });
        Ok(handle)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut state = self.state();
        let before = state.subscribers.len();
        state.subscribers.retain(|sub| sub.handle.id != handle.id);
        if state.subscribers.len() < before {
            tracing::debug!("Closed {} on {}", handle.id, handle.table);
        }
    }
}
