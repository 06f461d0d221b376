//! Change events delivered by a subscription.

use crate::record::{Record, RecordId};
use serde::{Deserialize, Serialize};

/// Kind of a change, shared by events and mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change in the remote table.
///
/// Inserts and updates carry the full post-change row; deletes carry only
/// the identifier of the removed row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChangeEvent {
    Insert(Record),
    Update(Record),
    Delete(RecordId),
}

impl ChangeEvent {
    /// The identifier of the affected row.
    pub fn id(&self) -> &RecordId {
        match self {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => &record.id,
            ChangeEvent::Delete(id) => id,
        }
    }

    /// The kind of change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert(_) => ChangeKind::Insert,
            ChangeEvent::Update(_) => ChangeKind::Update,
            ChangeEvent::Delete(_) => ChangeKind::Delete,
        }
    }

    /// The post-change row, if the event carries one.
    pub fn record(&self) -> Option<&Record> {
        match self {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => Some(record),
            ChangeEvent::Delete(_) => None,
        }
    }
}
