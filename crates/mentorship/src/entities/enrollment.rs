use chrono::{DateTime, Utc};
use livesync::{Entity, FieldReader, OwnerId, Record, RecordId, SchemaError};
use serde::{Deserialize, Serialize};

/// A user's enrollment in a course, with watch progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseEnrollment {
    pub id: RecordId,
    pub user_id: OwnerId,
    pub course_id: String,
    /// 0..=100
    pub progress_percentage: u8,
    /// Seconds into the current lesson video
    pub last_watched_position: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CourseEnrollment {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

impl Entity for CourseEnrollment {
    const TABLE: &'static str = "user_course_enrollments";

    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        let reader = FieldReader::new(Self::TABLE, record);

        let progress = reader.optional_i64("progress_percentage")?.unwrap_or(0);
        let progress_percentage = u8::try_from(progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| {
                reader.invalid(
                    "progress_percentage",
                    format!("{} is outside 0..=100", progress),
                )
            })?;

        Ok(Self {
            id: record.id.clone(),
            user_id: reader.owner()?.clone(),
            course_id: reader.required_str("course_id")?.to_string(),
            progress_percentage,
            last_watched_position: reader.optional_i64("last_watched_position")?.unwrap_or(0),
            completed_at: reader.optional_timestamp("completed_at")?,
            updated_at: record.version,
        })
    }
}
