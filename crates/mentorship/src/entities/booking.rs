use super::parse_enum;
use chrono::{DateTime, Utc};
use livesync::{Entity, FieldReader, OwnerId, Record, RecordId, SchemaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a mentoring session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "no_show" => Ok(SessionStatus::NoShow),
            _ => Err(()),
        }
    }
}

/// A session booked with a mentor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MentorBooking {
    pub id: RecordId,
    pub user_id: OwnerId,
    pub mentor_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MentorBooking {
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Scheduled && self.scheduled_at > now
    }
}

impl Entity for MentorBooking {
    const TABLE: &'static str = "mentor_bookings";

    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        let reader = FieldReader::new(Self::TABLE, record);
        let status = match reader.optional_str("status")? {
            Some(raw) => parse_enum(&reader, "status", raw)?,
            None => SessionStatus::Scheduled,
        };

        Ok(Self {
            id: record.id.clone(),
            user_id: reader.owner()?.clone(),
            mentor_id: reader.required_str("mentor_id")?.to_string(),
            scheduled_at: reader.required_timestamp("scheduled_at")?,
            status,
            notes: reader.optional_str("notes")?.map(str::to_string),
            updated_at: record.version,
        })
    }
}
