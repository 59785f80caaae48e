use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message for a user, written alongside the change that caused it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: UserId, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            message: message.into(),
            created_at: at,
        }
    }
}
