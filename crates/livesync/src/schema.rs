//! Schema validation at the store boundary.
//!
//! Rows arrive from the remote store as loosely typed JSON. `RowShape` turns a
//! raw row into a `Record`, and `Entity` implementations turn a `Record` into
//! a typed row, failing with a `SchemaError` that names the table and column
//! when the payload drifts from what the client expects.

use crate::error::SchemaError;
use crate::record::{Fields, OwnerId, Record, RecordId};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A typed row of one table.
pub trait Entity: Sized {
    /// Name of the table the entity lives in.
    const TABLE: &'static str;

    /// Validate and convert a record.
    fn from_record(record: &Record) -> Result<Self, SchemaError>;
}

/// Convert every record, failing on the first invalid one.
pub fn decode_all<E: Entity>(records: &[Record]) -> Result<Vec<E>, SchemaError> {
    records.iter().map(E::from_record).collect()
}

/// Typed accessors over a record's columns.
pub struct FieldReader<'a> {
    table: &'a str,
    record: &'a Record,
}

impl<'a> FieldReader<'a> {
    /// Create a reader for a record of `table`.
    pub fn new(table: &'a str, record: &'a Record) -> Self {
        Self { table, record }
    }

    fn missing(&self, field: &str) -> SchemaError {
        SchemaError::MissingField {
            table: self.table.to_string(),
            field: field.to_string(),
        }
    }

    fn wrong_type(&self, field: &str, expected: &'static str) -> SchemaError {
        SchemaError::WrongType {
            table: self.table.to_string(),
            field: field.to_string(),
            expected,
        }
    }

    /// Build an `InvalidValue` error for `field`.
    pub fn invalid(&self, field: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidValue {
            table: self.table.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Column value, with explicit nulls treated as absent.
    fn value(&self, field: &str) -> Option<&'a Value> {
        match self.record.field(field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Owner of the record, required.
    pub fn owner(&self) -> Result<&'a OwnerId, SchemaError> {
        self.record
            .owner_id
            .as_ref()
            .ok_or_else(|| self.missing("user_id"))
    }

    pub fn required_str(&self, field: &str) -> Result<&'a str, SchemaError> {
        self.optional_str(field)?.ok_or_else(|| self.missing(field))
    }

    pub fn optional_str(&self, field: &str) -> Result<Option<&'a str>, SchemaError> {
        match self.value(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.wrong_type(field, "a string")),
        }
    }

    pub fn required_i64(&self, field: &str) -> Result<i64, SchemaError> {
        self.optional_i64(field)?.ok_or_else(|| self.missing(field))
    }

    pub fn optional_i64(&self, field: &str) -> Result<Option<i64>, SchemaError> {
        match self.value(field) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(field, "an integer")),
        }
    }

    pub fn optional_bool(&self, field: &str) -> Result<Option<bool>, SchemaError> {
        match self.value(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.wrong_type(field, "a boolean")),
        }
    }

    pub fn required_timestamp(&self, field: &str) -> Result<DateTime<Utc>, SchemaError> {
        self.optional_timestamp(field)?
            .ok_or_else(|| self.missing(field))
    }

    pub fn optional_timestamp(&self, field: &str) -> Result<Option<DateTime<Utc>>, SchemaError> {
        match self.optional_str(field) {
            Ok(None) => Ok(None),
            Ok(Some(raw)) => parse_timestamp(raw)
                .map(Some)
                .ok_or_else(|| self.invalid(field, format!("`{}` is not an RFC 3339 timestamp", raw))),
            Err(_) => Err(self.wrong_type(field, "an RFC 3339 timestamp")),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Column layout of a raw row.
///
/// Names the columns holding the identifier, the owner and the version; every
/// other column lands in `Record::fields`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowShape {
    pub table: String,
    pub id_column: String,
    pub owner_column: Option<String>,
    pub version_column: String,
}

impl RowShape {
    /// Layout with `id`, `user_id` and `updated_at` columns.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: "id".to_string(),
            owner_column: Some("user_id".to_string()),
            version_column: "updated_at".to_string(),
        }
    }

    /// Use a different owner column, or none for public tables.
    pub fn owner_column(mut self, column: Option<&str>) -> Self {
        self.owner_column = column.map(str::to_string);
        self
    }

    /// Use a different version column.
    pub fn version_column(mut self, column: &str) -> Self {
        self.version_column = column.to_string();
        self
    }

    fn error_missing(&self, field: &str) -> SchemaError {
        SchemaError::MissingField {
            table: self.table.clone(),
            field: field.to_string(),
        }
    }

    fn error_type(&self, field: &str, expected: &'static str) -> SchemaError {
        SchemaError::WrongType {
            table: self.table.clone(),
            field: field.to_string(),
            expected,
        }
    }

    /// Validate a raw row and convert it into a record.
    pub fn parse(&self, row: Value) -> Result<Record, SchemaError> {
        let Value::Object(mut columns) = row else {
            return Err(self.error_type("<row>", "an object"));
        };

        let id = match columns.remove(&self.id_column) {
            Some(Value::String(id)) => RecordId::new(id),
            Some(Value::Number(n)) => RecordId::new(n.to_string()),
            Some(Value::Null) | None => return Err(self.error_missing(&self.id_column)),
            Some(_) => return Err(self.error_type(&self.id_column, "a string")),
        };

        let owner_id = match &self.owner_column {
            Some(column) => match columns.remove(column) {
                Some(Value::String(owner)) => Some(OwnerId::new(owner)),
                Some(Value::Null) | None => None,
                Some(_) => return Err(self.error_type(column, "a string")),
            },
            None => None,
        };

        let version = match columns.remove(&self.version_column) {
            Some(Value::String(raw)) => parse_timestamp(&raw).ok_or_else(|| {
                SchemaError::InvalidValue {
                    table: self.table.clone(),
                    field: self.version_column.clone(),
                    reason: format!("`{}` is not an RFC 3339 timestamp", raw),
                }
            })?,
            Some(Value::Null) | None => return Err(self.error_missing(&self.version_column)),
            Some(_) => return Err(self.error_type(&self.version_column, "a timestamp")),
        };

        let fields: Fields = columns;
        Ok(Record::new(id, owner_id, fields, version))
    }

    /// Render a record back into a raw row.
    pub fn render(&self, record: &Record) -> Value {
        let mut columns = record.fields.clone();
        columns.insert(self.id_column.clone(), Value::String(record.id.0.clone()));
        if let Some(column) = &self.owner_column {
            let owner = record
                .owner_id
                .as_ref()
                .map_or(Value::Null, |owner| Value::String(owner.0.clone()));
            columns.insert(column.clone(), owner);
        }
        columns.insert(
            self.version_column.clone(),
            Value::String(record.version.to_rfc3339()),
        );
        Value::Object(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_row() {
        let shape = RowShape::new("mentor_bookings");
        let record = shape
            .parse(json!({
                "id": "b-1",
                "user_id": "u-1",
                "updated_at": "2025-03-01T10:00:00Z",
                "mentor_id": "m-7",
                "status": "scheduled"
            }))
            .unwrap();

        assert_eq!(record.id, RecordId::new("b-1"));
        assert_eq!(record.owner_id, Some(OwnerId::new("u-1")));
        assert_eq!(record.field("status"), Some(&json!("scheduled")));
        assert!(record.field("id").is_none());
        assert!(record.field("updated_at").is_none());
    }

    #[test]
    fn test_parse_rejects_drifted_rows() {
        let shape = RowShape::new("mood_entries").version_column("created_at");

        assert!(matches!(
            shape.parse(json!([1, 2])),
            Err(SchemaError::WrongType { .. })
        ));
        assert!(matches!(
            shape.parse(json!({"created_at": "2025-03-01T10:00:00Z"})),
            Err(SchemaError::MissingField { field, .. }) if field == "id"
        ));
        assert!(matches!(
            shape.parse(json!({"id": "x", "user_id": 5, "created_at": "2025-03-01T10:00:00Z"})),
            Err(SchemaError::WrongType { field, .. }) if field == "user_id"
        ));
        assert!(matches!(
            shape.parse(json!({"id": "x", "created_at": "yesterday"})),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_public_table_without_owner() {
        let shape = RowShape::new("lessons").owner_column(None);
        let record = shape
            .parse(json!({"id": "l-1", "user_id": "ignored", "updated_at": "2025-03-01T10:00:00Z"}))
            .unwrap();
        assert!(record.owner_id.is_none());
        assert_eq!(record.field("user_id"), Some(&json!("ignored")));
    }

    #[test]
    fn test_render_round_trips() {
        let shape = RowShape::new("mentor_bookings");
        let raw = json!({
            "id": "b-1",
            "user_id": "u-1",
            "updated_at": "2025-03-01T10:00:00+00:00",
            "status": "scheduled"
        });
        let record = shape.parse(raw.clone()).unwrap();
        assert_eq!(shape.render(&record), raw);
    }

    #[test]
    fn test_field_reader_types() {
        let record = RowShape::new("t")
            .parse(json!({
                "id": "r",
                "user_id": "u",
                "updated_at": "2025-03-01T10:00:00Z",
                "title": "Intro",
                "progress": 40,
                "done": false,
                "completed_at": null,
                "scheduled_at": "2025-03-02T09:30:00Z"
            }))
            .unwrap();
        let reader = FieldReader::new("t", &record);

        assert_eq!(reader.required_str("title").unwrap(), "Intro");
        assert_eq!(reader.required_i64("progress").unwrap(), 40);
        assert_eq!(reader.optional_bool("done").unwrap(), Some(false));
        assert_eq!(reader.optional_timestamp("completed_at").unwrap(), None);
        assert!(reader.required_timestamp("scheduled_at").is_ok());
        assert_eq!(reader.owner().unwrap(), &OwnerId::new("u"));

        assert!(matches!(
            reader.required_str("progress"),
            Err(SchemaError::WrongType { .. })
        ));
        assert!(matches!(
            reader.required_i64("missing"),
            Err(SchemaError::MissingField { .. })
        ));
        assert!(matches!(
            reader.optional_timestamp("title"),
            Err(SchemaError::InvalidValue { .. })
        ));
    }
}
