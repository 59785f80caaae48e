use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a balance changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryReason<'a> {
    AutoEarn,
    Purchase { product_name: &'a str },
    Admin { note: &'a str },
    Bootstrap,
}

impl fmt::Display for EntryReason<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryReason::AutoEarn => f.write_str("auto-earn"),
            EntryReason::Purchase { product_name } => write!(f, "purchase:{product_name}"),
            EntryReason::Admin { note } => write!(f, "admin:{note}"),
            EntryReason::Bootstrap => f.write_str("bootstrap"),
        }
    }
}

/// Immutable audit record of one balance change.
///
/// The amounts of all entries for a user always sum to that user's balance.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct CreditHistoryEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl CreditHistoryEntry {
    pub fn new(user_id: UserId, amount: i64, reason: EntryReason<'_>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            reason: reason.to_string(),
            timestamp: at,
        }
    }
}
