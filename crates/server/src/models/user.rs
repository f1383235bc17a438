//! User model and session types.

use chrono::{DateTime, Utc};
use merchkins_core::{Email, UserId};
use serde::{Deserialize, Serialize};

/// Session storage keys.
pub mod session_keys {
    /// Serialized [`CurrentUser`](super::CurrentUser) for the session owner.
    pub const CURRENT_USER: &str = "current_user";
}

/// A platform account.
///
/// Passwords are stored separately (`user_password` table) and never leave
/// the database layer as anything but an argon2 hash.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub display_name: String,
    pub is_platform_admin: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of the authenticated user stored in the session.
///
/// Kept deliberately small; anything that can change mid-session (roles,
/// permissions) is resolved per request instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub display_name: String,
    pub is_platform_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            is_platform_admin: user.is_platform_admin,
        }
    }
}
