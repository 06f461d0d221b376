//! Live views for the mentorship platform.
//!
//! Each view mirrors one or more remote tables through
//! `livesync::RemoteCollectionSync` and exposes typed rows plus the writes
//! the UI issues.
//!
//! # Modules
//!
//! - `dashboard`: Course enrollments and mentor bookings of the user
//! - `journal`: The user's recent mood entries
//! - `feed`: Approved community posts and the user's own posts
//! - `entities`: Schema-validated row types
//! - `session`: The signed-in user a view is scoped to
//! - `error`: Error types for the crate

pub mod dashboard;
pub mod entities;
pub mod error;
pub mod feed;
pub mod journal;
pub mod session;
mod view;

pub use dashboard::Dashboard;
pub use entities::{
    CommunityPost, ContentType, CourseEnrollment, MentorBooking, Mood, MoodEntry, SessionStatus,
};
pub use error::{MentorshipError, Result};
pub use feed::CommunityFeed;
pub use journal::MoodJournal;
pub use session::Session;
