//! Error types for the livesync crate.

use thiserror::Error;

/// Result type alias for remote store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors reported by a remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The session is missing or expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The session is valid but may not touch this row or table.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The referenced row does not exist.
    #[error("Record {id} not found in {table}")]
    NotFound { table: String, id: String },

    /// The store refused the write, e.g. incrementing a non-integer column.
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced to the owner of a mirrored collection.
///
/// A dropped subscription or an event for an unknown record is never an
/// error; both are handled inside the sync driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The bulk read (or the subscription opened alongside it) failed.
    #[error("Failed to load collection: {0}")]
    Load(StoreError),

    /// A write-through call failed; the local collection is unchanged.
    #[error("Mutation failed: {0}")]
    Mutation(StoreError),

    /// Mutation attempted while no collection is live.
    #[error("No live collection")]
    NotActive,

    /// The collection was deactivated while the call was in flight.
    #[error("Collection was closed")]
    Closed,
}

impl SyncError {
    /// The underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            SyncError::Load(err) | SyncError::Mutation(err) => Some(err),
            SyncError::NotActive | SyncError::Closed => None,
        }
    }
}

/// Errors raised when a record does not match the expected row shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A required column is absent or null.
    #[error("{table}: missing field `{field}`")]
    MissingField { table: String, field: String },

    /// A column holds a value of the wrong JSON type.
    #[error("{table}: field `{field}` should be {expected}")]
    WrongType {
        table: String,
        field: String,
        expected: &'static str,
    },

    /// A column has the right type but an unacceptable value.
    #[error("{table}: invalid value for `{field}`: {reason}")]
    InvalidValue {
        table: String,
        field: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            table: "mentor_bookings".to_string(),
            id: "b-1".to_string(),
        };
        assert_eq!(err.to_string(), "Record b-1 not found in mentor_bookings");
    }

    #[test]
    fn test_sync_error_wraps_store_error() {
        let err = SyncError::Load(StoreError::Network("connection reset".to_string()));
        assert_eq!(
            err.to_string(),
            "Failed to load collection: Network error: connection reset"
        );
        assert!(err.store_error().is_some());
        assert!(SyncError::NotActive.store_error().is_none());
    }

    #[test]
    fn test_rejected_write_display() {
        let err = SyncError::Mutation(StoreError::Rejected(
            "community_posts.content is not an integer column".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Mutation failed: Write rejected: community_posts.content is not an integer column"
        );
    }
}
