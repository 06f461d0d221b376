//! Typed rows of the mirrored tables
//!
//! Each type implements `livesync::Entity`, validating the record's columns
//! and failing with a `SchemaError` naming the offending column.

mod booking;
mod enrollment;
mod mood;
mod post;

pub use booking::{MentorBooking, SessionStatus};
pub use enrollment::CourseEnrollment;
pub use mood::{Mood, MoodEntry};
pub use post::{CommunityPost, ContentType};

use livesync::{FieldReader, SchemaError};
use std::str::FromStr;

/// Parse an enum column through its `FromStr` impl.
fn parse_enum<T: FromStr>(
    reader: &FieldReader<'_>,
    field: &str,
    raw: &str,
) -> Result<T, SchemaError> {
    raw.parse()
        .map_err(|_| reader.invalid(field, format!("unknown value `{}`", raw)))
}
