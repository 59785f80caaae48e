use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A non-negative credit balance.
///
/// Balances are capped at `i64::MAX` so that every change can be recorded as a
/// signed history amount. Arithmetic saturates at both ends instead of failing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(u64);

impl Credits {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(i64::MAX as u64);

    pub fn new(value: u64) -> Self {
        Self(value.min(Self::MAX.0))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Applies a signed change, clamping the result into `[0, MAX]`.
    ///
    /// Returns the new balance together with the delta that was actually applied.
    pub fn apply(self, delta: i64) -> (Self, i64) {
        let current = i128::from(self.0);
        let target = (current + i128::from(delta)).clamp(0, i128::from(Self::MAX.0));
        (Self(target as u64), (target - current) as i64)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Credits> for u64 {
    fn from(credits: Credits) -> Self {
        credits.0
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// An identity already resolved by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn require_admin(&self, action: &str) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::User => Err(LedgerError::Forbidden(format!(
                "{action} requires the admin role"
            ))),
        }
    }
}

/// Registration input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            display_name: String::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Username must not be empty".to_string(),
            ));
        }
        if self.username.trim() != self.username {
            return Err(LedgerError::Validation(
                "Username must not have surrounding whitespace".to_string(),
            ));
        }
        let valid_email = self
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !valid_email {
            return Err(LedgerError::Validation(format!(
                "Invalid email address: {}",
                self.email
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub balance: Credits,
    pub last_earn: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the latest mutation; never moves backwards.
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(input: NewUser, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            username: input.username,
            email: input.email,
            display_name: input.display_name,
            role,
            balance: Credits::ZERO,
            last_earn: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.role)
    }

    /// Advances `updated_at` to `now` unless it is already later, and returns it.
    ///
    /// Every history entry for this user is stamped with this value, which keeps
    /// the user's history non-decreasing even if the clock steps back.
    pub fn stamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.updated_at = self.updated_at.max(now);
        self.updated_at
    }

    /// Seconds left until the next earn is allowed, or `None` if allowed now.
    pub fn earn_cooldown(&self, interval_secs: u64, now: DateTime<Utc>) -> Option<u64> {
        let last = self.last_earn?;
        let interval_ms = i64::try_from(interval_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let elapsed_ms = (now - last).num_milliseconds().max(0);
        if elapsed_ms >= interval_ms {
            return None;
        }
        let remaining_ms = (interval_ms - elapsed_ms) as u64;
        Some(remaining_ms.div_ceil(1000))
    }

    /// Credits an earn and records when it happened. Returns the applied delta.
    pub fn earn(&mut self, amount: u64, at: DateTime<Utc>) -> i64 {
        let delta = i64::try_from(amount).unwrap_or(i64::MAX);
        let (balance, applied) = self.balance.apply(delta);
        self.balance = balance;
        self.last_earn = Some(at);
        applied
    }

    /// Debits `price` if the balance covers it. Returns the applied (negative) delta.
    pub fn spend(&mut self, price: u64) -> Result<i64> {
        if self.balance.value() < price {
            return Err(LedgerError::InsufficientCredits {
                available: self.balance.value(),
                required: price,
            });
        }
        let (balance, applied) = self.balance.apply(-(price as i64));
        self.balance = balance;
        Ok(applied)
    }

    /// Applies an unrestricted adjustment, clamped at zero. Returns the applied delta.
    pub fn adjust(&mut self, delta: i64) -> i64 {
        let (balance, applied) = self.balance.apply(delta);
        self.balance = balance;
        applied
    }
}
