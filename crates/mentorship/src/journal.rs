//! Mood journal: the user's ten most recent entries, newest first.

use crate::entities::{Mood, MoodEntry};
use crate::error::{MentorshipError, Result};
use crate::session::Session;
use crate::view::{columns, newest_created, rows, written};
use livesync::{
    CollectionHandle, Entity, Mutation, Query, RecordId, RemoteCollectionSync, RemoteStore,
    SyncConfig,
};
use serde_json::json;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Number of entries the journal keeps
pub const RECENT_ENTRIES: usize = 10;

/// Accepted intensity ratings
pub const INTENSITY: RangeInclusive<u8> = 1..=10;

pub struct MoodJournal<S: RemoteStore + 'static> {
    session: Session,
    entries: RemoteCollectionSync<S>,
}

impl<S: RemoteStore + 'static> MoodJournal<S> {
    pub fn new(store: Arc<S>, session: Session, config: SyncConfig) -> Self {
        Self {
            entries: RemoteCollectionSync::new(store, config),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn start(&self) -> Result<CollectionHandle> {
        let query = Query::table(MoodEntry::TABLE)
            .filter(self.session.owned_rows())
            .order_by(newest_created())
            .limit(RECENT_ENTRIES);
        Ok(self.entries.activate(query).await?)
    }

    pub fn stop(&self) {
        self.entries.deactivate();
    }

    pub fn is_loading(&self) -> bool {
        self.entries.is_loading()
    }

    /// Recent entries, newest first.
    pub fn entries(&self) -> Result<Vec<MoodEntry>> {
        rows(&self.entries)
    }

    pub async fn log_mood(
        &self,
        mood: Mood,
        intensity: u8,
        notes: Option<&str>,
        gratitude_note: Option<&str>,
    ) -> Result<MoodEntry> {
        if !INTENSITY.contains(&intensity) {
            return Err(MentorshipError::InvalidInput(format!(
                "intensity {} is outside 1..=10",
                intensity
            )));
        }

        let fields = columns([
            ("mood", json!(mood.as_str())),
            ("intensity", json!(intensity)),
            ("notes", json!(non_blank(notes))),
            ("gratitude_note", json!(non_blank(gratitude_note))),
        ]);
        let mutated = self.entries.mutate(Mutation::insert(fields)).await?;
        written(mutated)
    }

    pub async fn delete_entry(&self, id: &RecordId) -> Result<()> {
        self.entries.mutate(Mutation::delete(id.clone())).await?;
        Ok(())
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}
