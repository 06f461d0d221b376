//! Signed-in user context

use livesync::{Filter, OwnerId};
use serde::{Deserialize, Serialize};

/// The user a view is scoped to.
///
/// Views take the session explicitly; switching users means building views
/// with a new session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: OwnerId,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: OwnerId::new(user_id),
        }
    }

    /// Filter matching rows owned by this user.
    pub fn owned_rows(&self) -> Filter {
        Filter::owner(self.user_id.clone())
    }
}
