//! Lifecycle state of a mirrored collection.
//!
//! A collection moves `Uninitialized → Loading → Live → Closed`. A failed
//! bulk read moves it from `Loading` straight to `Closed` once retries are
//! exhausted. Nothing leaves `Closed`.
//!
//! Independently of the state, a live collection is *stale* while its
//! subscription is being re-established; it keeps its contents meanwhile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Created, not yet activated
    Uninitialized,
    /// Bulk read in flight
    Loading,
    /// Loaded and folding change events
    Live,
    /// Deactivated or failed to load
    Closed,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Uninitialized
    }
}

impl SyncState {
    /// Check whether moving to `next` is a valid transition.
    pub fn can_transition_to(self, next: SyncState) -> bool {
        use SyncState::*;
        matches!(
            (self, next),
            (Uninitialized, Loading)
                | (Loading, Loading)
                | (Loading, Live)
                | (Loading, Closed)
                | (Live, Closed)
        )
    }
}

/// Snapshot of a collection's sync status, for display
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Lifecycle state
    pub state: SyncState,
    /// Subscription lost; contents may lag the remote table
    pub stale: bool,
    /// Completion time of the last successful bulk read
    pub last_synced: Option<DateTime<Utc>>,
    /// Resubscription attempts since the last drop
    pub reconnect_attempts: u32,
    /// Message of the last load failure
    pub last_error: Option<String>,
}

impl SyncStatus {
    /// Check whether the bulk read is still in flight.
    pub fn is_loading(&self) -> bool {
        self.state == SyncState::Loading
    }

    /// Check whether the collection is live.
    pub fn is_live(&self) -> bool {
        self.state == SyncState::Live
    }

    /// Check whether the collection has been closed.
    pub fn is_closed(&self) -> bool {
        self.state == SyncState::Closed
    }

    /// Whether the UI should show a reconnecting indicator.
    pub fn is_reconnecting(&self) -> bool {
        self.is_live() && self.stale
    }

    /// Short label for a status indicator.
    pub fn short_status(&self) -> &'static str {
        match self.state {
            SyncState::Uninitialized => "Idle",
            SyncState::Loading => "Loading",
            SyncState::Live if self.stale => "Reconnecting",
            SyncState::Live => "Live",
            SyncState::Closed if self.last_error.is_some() => "Failed",
            SyncState::Closed => "Closed",
        }
    }
}
