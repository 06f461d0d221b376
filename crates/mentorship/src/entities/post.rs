use super::parse_enum;
use chrono::{DateTime, Utc};
use livesync::{Entity, FieldReader, OwnerId, Record, RecordId, SchemaError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of content a community post carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Lesson,
    Quiz,
    Story,
    Poem,
    Drawing,
    Journal,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Lesson => "lesson",
            ContentType::Quiz => "quiz",
            ContentType::Story => "story",
            ContentType::Poem => "poem",
            ContentType::Drawing => "drawing",
            ContentType::Journal => "journal",
        }
    }
}

impl FromStr for ContentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(ContentType::Lesson),
            "quiz" => Ok(ContentType::Quiz),
            "story" => Ok(ContentType::Story),
            "poem" => Ok(ContentType::Poem),
            "drawing" => Ok(ContentType::Drawing),
            "journal" => Ok(ContentType::Journal),
            _ => Err(()),
        }
    }
}

/// A post in the community feed.
///
/// Posts start unapproved; moderators flip `is_approved` before they show up
/// in the public feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: RecordId,
    /// Absent for posts whose author account was removed
    pub user_id: Option<OwnerId>,
    pub content: String,
    pub content_type: Option<ContentType>,
    pub is_anonymous: bool,
    pub is_approved: bool,
    pub likes_count: u32,
    pub created_at: DateTime<Utc>,
}

impl CommunityPost {
    /// Author to display, hidden for anonymous posts.
    pub fn author(&self) -> Option<&OwnerId> {
        if self.is_anonymous {
            None
        } else {
            self.user_id.as_ref()
        }
    }
}

impl Entity for CommunityPost {
    const TABLE: &'static str = "community_posts";

    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        let reader = FieldReader::new(Self::TABLE, record);
        let content_type = match reader.optional_str("content_type")? {
            Some(raw) => Some(parse_enum(&reader, "content_type", raw)?),
            None => None,
        };
        let likes = reader.optional_i64("likes_count")?.unwrap_or(0);
        let likes_count = u32::try_from(likes)
            .map_err(|_| reader.invalid("likes_count", format!("{} is negative or too large", likes)))?;

        Ok(Self {
            id: record.id.clone(),
            user_id: record.owner_id.clone(),
            content: reader.required_str("content")?.to_string(),
            content_type,
            is_anonymous: reader.optional_bool("is_anonymous")?.unwrap_or(false),
            is_approved: reader.optional_bool("is_approved")?.unwrap_or(false),
            likes_count,
            created_at: reader.required_timestamp("created_at")?,
        })
    }
}
