//! Error types for mentorship views

use livesync::{SchemaError, SyncError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MentorshipError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already enrolled in course {0}")]
    AlreadyEnrolled(String),

    #[error("Not enrolled in course {0}")]
    NotEnrolled(String),

    #[error("Post not found: {0}")]
    PostNotFound(String),
}

pub type Result<T> = std::result::Result<T, MentorshipError>;
