//! Learner dashboard
//!
//! Mirrors the signed-in user's course enrollments and mentor bookings, and
//! writes progress and bookings through to the store.

use crate::entities::{CourseEnrollment, MentorBooking, SessionStatus};
use crate::error::{MentorshipError, Result};
use crate::session::Session;
use crate::view::{columns, rows, written};
use chrono::{DateTime, Utc};
use livesync::{
    CollectionHandle, Entity, Mutation, Query, RemoteCollectionSync, RemoteStore, SyncConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Live enrollments and bookings of one user.
pub struct Dashboard<S: RemoteStore + 'static> {
    session: Session,
    enrollments: RemoteCollectionSync<S>,
    bookings: RemoteCollectionSync<S>,
}

impl<S: RemoteStore + 'static> Dashboard<S> {
    pub fn new(store: Arc<S>, session: Session, config: SyncConfig) -> Self {
        Self {
            enrollments: RemoteCollectionSync::new(Arc::clone(&store), config.clone()),
            bookings: RemoteCollectionSync::new(store, config),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn enrollments_query(&self) -> Query {
        Query::table(CourseEnrollment::TABLE).filter(self.session.owned_rows())
    }

    fn bookings_query(&self) -> Query {
        Query::table(MentorBooking::TABLE).filter(self.session.owned_rows())
    }

    /// Load both collections and start following changes.
    pub async fn start(&self) -> Result<()> {
        self.enrollments.activate(self.enrollments_query()).await?;
        if let Err(e) = self.bookings.activate(self.bookings_query()).await {
            self.enrollments.deactivate();
            return Err(e.into());
        }
        tracing::info!("Dashboard live for {}", self.session.user_id);
        Ok(())
    }

    /// Stop following changes and discard both collections.
    pub fn stop(&self) {
        self.enrollments.deactivate();
        self.bookings.deactivate();
    }

    pub fn is_loading(&self) -> bool {
        self.enrollments.is_loading() || self.bookings.is_loading()
    }

    pub fn enrollments(&self) -> Result<Vec<CourseEnrollment>> {
        rows(&self.enrollments)
    }

    pub fn bookings(&self) -> Result<Vec<MentorBooking>> {
        rows(&self.bookings)
    }

    pub fn enrollment_handle(&self) -> Option<CollectionHandle> {
        self.enrollments.collection()
    }

    pub fn booking_handle(&self) -> Option<CollectionHandle> {
        self.bookings.collection()
    }

    fn enrollment_for(&self, course_id: &str) -> Result<Option<CourseEnrollment>> {
        Ok(self
            .enrollments()?
            .into_iter()
            .find(|enrollment| enrollment.course_id == course_id))
    }

    /// Enroll the user in a course with zero progress.
    pub async fn enroll_in_course(&self, course_id: &str) -> Result<CourseEnrollment> {
        if course_id.trim().is_empty() {
            return Err(MentorshipError::InvalidInput("course id is empty".to_string()));
        }
        if self.enrollment_for(course_id)?.is_some() {
            return Err(MentorshipError::AlreadyEnrolled(course_id.to_string()));
        }

        let fields = columns([
            ("course_id", json!(course_id)),
            ("progress_percentage", json!(0)),
            ("last_watched_position", json!(0)),
            ("completed_at", Value::Null),
        ]);
        let mutated = self.enrollments.mutate(Mutation::insert(fields)).await?;
        tracing::debug!("{} enrolled in {}", self.session.user_id, course_id);
        written(mutated)
    }

    /// Record watch progress; reaching 100 marks the course completed.
    pub async fn update_course_progress(
        &self,
        course_id: &str,
        progress: u8,
        watch_position: i64,
    ) -> Result<CourseEnrollment> {
        if progress > 100 {
            return Err(MentorshipError::InvalidInput(format!(
                "progress {} is outside 0..=100",
                progress
            )));
        }
        if watch_position < 0 {
            return Err(MentorshipError::InvalidInput(format!(
                "watch position {} is negative",
                watch_position
            )));
        }
        let enrollment = self
            .enrollment_for(course_id)?
            .ok_or_else(|| MentorshipError::NotEnrolled(course_id.to_string()))?;

        let completed_at = if progress >= 100 {
            json!(enrollment
                .completed_at
                .unwrap_or_else(Utc::now)
                .to_rfc3339())
        } else {
            Value::Null
        };
        let fields = columns([
            ("progress_percentage", json!(progress)),
            ("last_watched_position", json!(watch_position)),
            ("completed_at", completed_at),
        ]);

        let mutated = self
            .enrollments
            .mutate(Mutation::update(enrollment.id, fields))
            .await?;
        written(mutated)
    }

    /// Book a session with a mentor.
    pub async fn book_mentor(
        &self,
        mentor_id: &str,
        scheduled_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<MentorBooking> {
        if mentor_id.trim().is_empty() {
            return Err(MentorshipError::InvalidInput("mentor id is empty".to_string()));
        }

        let fields = columns([
            ("mentor_id", json!(mentor_id)),
            ("scheduled_at", json!(scheduled_at.to_rfc3339())),
            ("notes", json!(notes)),
            ("status", json!(SessionStatus::Scheduled.as_str())),
        ]);
        let mutated = self.bookings.mutate(Mutation::insert(fields)).await?;
        tracing::debug!("{} booked {} at {}", self.session.user_id, mentor_id, scheduled_at);
        written(mutated)
    }
}
