//! In-memory mirror of a table slice.
//!
//! `Collection` holds no I/O; it only knows how to fold change events into an
//! ordered, optionally bounded list of records. The sync driver wraps it in a
//! lock so each event is applied atomically with respect to readers.
//!
//! # Folding rules
//!
//! - Insert: added at its sort position (appended when unordered). A row
//!   already present is replaced only by a strictly newer version, so the
//!   echo of a local write is absorbed. Rows the filter rejects are ignored.
//! - Update: replaces the present row unless the local copy is newer. A row
//!   that no longer matches the filter leaves the collection. Unknown ids are
//!   ignored.
//! - Delete: removes the present row; unknown ids are ignored.
//! - Bounded collections drop the row ranked last when ordered, or the
//!   earliest arrival when unordered.

use crate::event::ChangeEvent;
use crate::filter::Filter;
use crate::query::{OrderBy, Query};
use crate::record::{Record, RecordId};
use std::cmp::Ordering;

/// Why an event left the collection untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Same or older copy of a row already present.
    Duplicate,
    /// Update older than the local copy.
    Stale,
    /// Update or delete for a row not in the collection.
    Orphan,
    /// Insert of a row the filter rejects.
    OutOfFilter,
    /// Insert that sorts past the bound.
    BeyondLimit,
}

/// Outcome of folding one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A new row was added, possibly evicting another.
    Inserted { evicted: Option<RecordId> },
    /// A present row was replaced.
    Replaced,
    /// A present row was removed.
    Removed,
    /// Nothing changed.
    Ignored(IgnoreReason),
}

impl Applied {
    /// Check whether the collection changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Applied::Ignored(_))
    }
}

/// Ordered, id-unique list of records mirroring a table slice.
#[derive(Clone, Debug)]
pub struct Collection {
    records: Vec<Record>,
    filter: Filter,
    order_by: Option<OrderBy>,
    limit: Option<usize>,
}

impl Collection {
    /// Create an empty collection for a query.
    pub fn new(query: &Query) -> Self {
        Self {
            records: Vec::new(),
            filter: query.filter.clone(),
            order_by: query.order_by.clone(),
            limit: query.limit,
        }
    }

    /// Replace the contents with the result of a bulk read.
    ///
    /// Rows are re-checked against the filter, de-duplicated (newest copy
    /// wins), sorted and bounded, so a store that ignores part of the query
    /// still yields a consistent collection.
    pub fn load(&mut self, rows: Vec<Record>) {
        self.records.clear();
        for row in rows {
            if !self.filter.matches(&row) {
                continue;
            }
            match self.position(&row.id) {
                Some(pos) => {
                    if row.is_newer_than(&self.records[pos]) {
                        self.records[pos] = row;
                    }
                }
                None => self.records.push(row),
            }
        }
        if let Some(order) = &self.order_by {
            self.records.sort_by(|a, b| order.compare(a, b));
        }
        if let Some(limit) = self.limit {
            self.records.truncate(limit);
        }
    }

    /// Fold one change event into the collection.
    pub fn apply(&mut self, event: ChangeEvent) -> Applied {
        match event {
            ChangeEvent::Insert(record) => self.insert(record),
            ChangeEvent::Update(record) => self.update(record),
            ChangeEvent::Delete(id) => self.remove(&id),
        }
    }

    fn insert(&mut self, record: Record) -> Applied {
        if !self.filter.matches(&record) {
            return Applied::Ignored(IgnoreReason::OutOfFilter);
        }

        if let Some(pos) = self.position(&record.id) {
            if !record.is_newer_than(&self.records[pos]) {
                return Applied::Ignored(IgnoreReason::Duplicate);
            }
            self.records.remove(pos);
            self.place(record);
            return Applied::Replaced;
        }

        let id = record.id.clone();
        self.place(record);
        match self.enforce_limit() {
            Some(evicted) if evicted == id => Applied::Ignored(IgnoreReason::BeyondLimit),
            evicted => Applied::Inserted { evicted },
        }
    }

    fn update(&mut self, record: Record) -> Applied {
        let Some(pos) = self.position(&record.id) else {
            return Applied::Ignored(IgnoreReason::Orphan);
        };
        let current = &self.records[pos];
        if current.is_newer_than(&record) {
            return Applied::Ignored(IgnoreReason::Stale);
        }
        if *current == record {
            return Applied::Ignored(IgnoreReason::Duplicate);
        }

        self.records.remove(pos);
        if !self.filter.matches(&record) {
            return Applied::Removed;
        }
        self.place(record);
        Applied::Replaced
    }

    fn remove(&mut self, id: &RecordId) -> Applied {
        match self.position(id) {
            Some(pos) => {
                self.records.remove(pos);
                Applied::Removed
            }
            None => Applied::Ignored(IgnoreReason::Orphan),
        }
    }

    /// Insert at the sort position, after any equal keys.
    fn place(&mut self, record: Record) {
        match &self.order_by {
            Some(order) => {
                let idx = self
                    .records
                    .partition_point(|r| order.compare(r, &record) != Ordering::Greater);
                self.records.insert(idx, record);
            }
            None => self.records.push(record),
        }
    }

    fn enforce_limit(&mut self) -> Option<RecordId> {
        let limit = self.limit?;
        if self.records.len() <= limit {
            return None;
        }
        let evicted = if self.order_by.is_some() {
            self.records.pop()
        } else {
            Some(self.records.remove(0))
        };
        evicted.map(|record| record.id)
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }

    /// Records in collection order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterate records in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Look up a record by id.
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Check whether a record is present.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// The predicate this collection mirrors.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The bound on the number of records, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
