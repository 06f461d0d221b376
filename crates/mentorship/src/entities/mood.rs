use super::parse_enum;
use chrono::{DateTime, Utc};
use livesync::{Entity, FieldReader, OwnerId, Record, RecordId, SchemaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mood recorded in a journal entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Sad,
    Excited,
    Anxious,
    Calm,
    Frustrated,
    Confident,
    Overwhelmed,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Excited,
        Mood::Anxious,
        Mood::Calm,
        Mood::Frustrated,
        Mood::Confident,
        Mood::Overwhelmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Excited => "excited",
            Mood::Anxious => "anxious",
            Mood::Calm => "calm",
            Mood::Frustrated => "frustrated",
            Mood::Confident => "confident",
            Mood::Overwhelmed => "overwhelmed",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == s)
            .ok_or(())
    }
}

/// One mood journal entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: RecordId,
    pub user_id: OwnerId,
    pub mood: Mood,
    /// 1..=10
    pub intensity: Option<u8>,
    pub notes: Option<String>,
    pub gratitude_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for MoodEntry {
    const TABLE: &'static str = "mood_entries";

    fn from_record(record: &Record) -> Result<Self, SchemaError> {
        let reader = FieldReader::new(Self::TABLE, record);
        let mood = parse_enum(&reader, "mood", reader.required_str("mood")?)?;
        let intensity = match reader.optional_i64("intensity")? {
            Some(value @ 1..=10) => Some(value as u8),
            Some(value) => {
                return Err(reader.invalid("intensity", format!("{} is outside 1..=10", value)))
            }
            None => None,
        };

        Ok(Self {
            id: record.id.clone(),
            user_id: reader.owner()?.clone(),
            mood,
            intensity,
            notes: reader.optional_str("notes")?.map(str::to_string),
            gratitude_note: reader.optional_str("gratitude_note")?.map(str::to_string),
            created_at: reader.required_timestamp("created_at")?,
        })
    }
}
