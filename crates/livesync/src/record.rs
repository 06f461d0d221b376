//! Records mirrored from a remote table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Column values of a record, keyed by column name.
pub type Fields = serde_json::Map<String, Value>;

/// Identifier of a record, unique within its table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a record ID from an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// Generate a new unique record ID.
    pub fn generate() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

/// Identifier of the user a record belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    /// Create an owner ID.
    pub fn new(id: impl Into<String>) -> Self {
        OwnerId(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        OwnerId(s.to_string())
    }
}

/// One row of a remote table.
///
/// `version` is the store's modification timestamp for the row. Two copies of
/// the same row are ordered by it; a copy with an older version never
/// overwrites a newer one in a collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Immutable identifier.
    pub id: RecordId,
    /// Owning user, if the row is user-scoped.
    pub owner_id: Option<OwnerId>,
    /// Remaining column values.
    pub fields: Fields,
    /// Last modification time assigned by the store.
    pub version: DateTime<Utc>,
}

impl Record {
    /// Create a record.
    pub fn new(
        id: RecordId,
        owner_id: Option<OwnerId>,
        fields: Fields,
        version: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            fields,
            version,
        }
    }

    /// Get a column value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a column value, returning the record for chaining.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Check whether this copy is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &Record) -> bool {
        self.version > other.version
    }

    /// Check whether the record belongs to `owner`.
    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        self.owner_id.as_ref() == Some(owner)
    }

    /// Apply a partial update of column values.
    pub fn merge_fields(&mut self, fields: Fields) {
        for (name, value) in fields {
            self.fields.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_record_id_generate_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_id_conversions() {
        let id: RecordId = "row-1".into();
        assert_eq!(id.as_str(), "row-1");
        assert_eq!(id.to_string(), "row-1");
        assert_eq!(RecordId::from("row-1".to_string()), id);
    }

    #[test]
    fn test_field_access_and_merge() {
        let mut record = Record::new(RecordId::new("r"), None, Fields::new(), at(1))
            .with_field("status", "scheduled")
            .with_field("notes", json!(null));

        assert_eq!(record.field("status"), Some(&json!("scheduled")));

        let mut patch = Fields::new();
        patch.insert("status".to_string(), json!("completed"));
        record.merge_fields(patch);

        assert_eq!(record.field("status"), Some(&json!("completed")));
        assert_eq!(record.field("notes"), Some(&json!(null)));
    }

    #[test]
    fn test_version_ordering() {
        let old = Record::new(RecordId::new("r"), None, Fields::new(), at(1));
        let new = Record::new(RecordId::new("r"), None, Fields::new(), at(2));
        assert!(new.is_newer_than(&old));
        assert!(!old.is_newer_than(&new));
        assert!(!old.is_newer_than(&old));
    }

    #[test]
    fn test_ownership() {
        let owner = OwnerId::new("user-1");
        let record = Record::new(RecordId::new("r"), Some(owner.clone()), Fields::new(), at(1));
        assert!(record.is_owned_by(&owner));
        assert!(!record.is_owned_by(&OwnerId::new("user-2")));
    }

    #[test]
    fn test_record_serialization() {
        let record = Record::new(
            RecordId::new("r"),
            Some(OwnerId::new("u")),
            Fields::new(),
            at(10),
        )
        .with_field("mood", "happy");

        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
