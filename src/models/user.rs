use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,
    pub password_hash: String,

    // Telegram chat id, stored as text
    #[serde(default)]
    pub telegram_id: Option<String>,
    #[serde(default)]
    pub telegram_verified: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// A user can receive notifications only with a verified, non-empty chat id.
    pub fn notification_chat(&self) -> Option<&str> {
        match self.telegram_id.as_deref().map(str::trim) {
            Some(id) if self.telegram_verified && !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

/// The logged-in user as seen by handlers (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: ObjectId,
    pub email: String,
    pub telegram_id: Option<String>,
    pub telegram_verified: bool,
}

impl From<User> for CurrentUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            telegram_id: u.telegram_id,
            telegram_verified: u.telegram_verified,
        }
    }
}
