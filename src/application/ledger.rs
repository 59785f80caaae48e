use super::retry::retry_on_conflict;
use super::settings;
use crate::config::LedgerConfig;
use crate::domain::clock::Clock;
use crate::domain::history::{CreditHistoryEntry, EntryReason};
use crate::domain::notification::Notification;
use crate::domain::ports::{Expected, StoreHandle, Versioned, WriteBatch};
use crate::domain::user::{Credits, NewUser, Principal, Role, User, UserId};
use crate::error::{LedgerError, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarnReceipt {
    pub new_balance: Credits,
    pub next_earn_in_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustReceipt {
    pub new_balance: Credits,
    /// The change actually recorded, after clamping at zero.
    pub applied: i64,
}

/// Owns every rule that changes a user's balance outside of a purchase.
///
/// Each mutation reads the user document, decides, and commits the new
/// document together with its history entry as one conditional write. A
/// write that lost a race is retried from a fresh read, so the cooldown and
/// clamping rules are always evaluated against the state they are applied to.
#[derive(Clone)]
pub struct LedgerEngine {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    config: Arc<LedgerConfig>,
}

impl LedgerEngine {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>, config: Arc<LedgerConfig>) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Creates a regular user with a zero balance.
    pub async fn register(&self, input: NewUser) -> Result<User> {
        input.validate()?;
        let user = User::new(input, Role::User, self.clock.now());
        self.store
            .commit(WriteBatch::new().put_user(user.clone(), Expected::Absent))
            .await?;
        info!(user = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn user(&self, id: &UserId) -> Result<User> {
        Ok(self.load_user(id).await?.into_doc())
    }

    pub async fn user_by_username(&self, username: &str) -> Result<User> {
        self.store
            .user_by_username(username)
            .await?
            .map(Versioned::into_doc)
            .ok_or_else(|| LedgerError::UnknownUser(username.to_string()))
    }

    pub async fn balance(&self, id: &UserId) -> Result<Credits> {
        Ok(self.user(id).await?.balance)
    }

    pub async fn users(&self, actor: &Principal) -> Result<Vec<User>> {
        actor.require_admin("listing users")?;
        let users = self.store.users().await?;
        Ok(users.into_iter().map(Versioned::into_doc).collect())
    }

    /// Grants the configured amount if the user's cooldown has elapsed.
    pub async fn earn(&self, id: &UserId) -> Result<EarnReceipt> {
        let result = retry_on_conflict(self.config.max_conflict_retries, "earn", || {
            self.try_earn(id)
        })
        .await;
        match &result {
            Ok(receipt) => info!(user = %id, balance = %receipt.new_balance, "credits earned"),
            Err(LedgerError::RateLimited { remaining_seconds }) => {
                debug!(user = %id, remaining_seconds, "earn rate limited")
            }
            Err(_) => {}
        }
        result
    }

    async fn try_earn(&self, id: &UserId) -> Result<EarnReceipt> {
        let (_, settings) = settings::load(self.store.as_ref(), &self.config).await?;
        let current = self.load_user(id).await?;
        let expected = current.expected();
        let mut user = current.into_doc();

        let now = self.clock.now();
        if let Some(remaining_seconds) = user.earn_cooldown(settings.credit_interval_secs, now) {
            return Err(LedgerError::RateLimited { remaining_seconds });
        }

        let at = user.stamp(now);
        let applied = user.earn(settings.credit_amount, at);
        let receipt = EarnReceipt {
            new_balance: user.balance,
            next_earn_in_seconds: settings.credit_interval_secs,
        };
        let entry = CreditHistoryEntry::new(user.id, applied, EntryReason::AutoEarn, at);
        self.store
            .commit(WriteBatch::new().put_user(user, expected).append_history(entry))
            .await?;
        Ok(receipt)
    }

    /// Adds or removes credits on an admin's behalf.
    ///
    /// Debits larger than the balance clamp it to zero; the history entry
    /// records the clamped change, not the requested one.
    pub async fn admin_adjust(
        &self,
        actor: &Principal,
        id: &UserId,
        delta: i64,
        reason: &str,
    ) -> Result<AdjustReceipt> {
        actor.require_admin("adjusting credits")?;
        if reason.trim().is_empty() {
            return Err(LedgerError::Validation(
                "An adjustment needs a reason".to_string(),
            ));
        }
        let receipt = retry_on_conflict(self.config.max_conflict_retries, "admin_adjust", || {
            self.try_adjust(id, delta, reason)
        })
        .await?;
        info!(
            admin = %actor.user_id,
            user = %id,
            requested = delta,
            applied = receipt.applied,
            balance = %receipt.new_balance,
            "balance adjusted by admin"
        );
        Ok(receipt)
    }

    async fn try_adjust(&self, id: &UserId, delta: i64, reason: &str) -> Result<AdjustReceipt> {
        let current = self.load_user(id).await?;
        let expected = current.expected();
        let mut user = current.into_doc();

        let at = user.stamp(self.clock.now());
        let applied = user.adjust(delta);
        let receipt = AdjustReceipt {
            new_balance: user.balance,
            applied,
        };
        let message = if applied >= 0 {
            format!("An administrator added {applied} credits: {reason}")
        } else {
            format!("An administrator removed {} credits: {reason}", -applied)
        };
        let reason = EntryReason::Admin { note: reason };
        let entry = CreditHistoryEntry::new(user.id, applied, reason, at);
        let notification = Notification::new(user.id, message, at);
        self.store
            .commit(
                WriteBatch::new()
                    .put_user(user, expected)
                    .append_history(entry)
                    .notify(notification),
            )
            .await?;
        Ok(receipt)
    }

    /// The user's most recent history entries, newest first.
    ///
    /// Each call runs a fresh store query; `limit` is capped at the configured
    /// history limit.
    pub async fn history(&self, id: &UserId, limit: usize) -> Result<Vec<CreditHistoryEntry>> {
        let limit = self.bounded(limit)?;
        self.load_user(id).await?;
        self.store.history(id, limit).await
    }

    pub async fn notifications(&self, id: &UserId, limit: usize) -> Result<Vec<Notification>> {
        let limit = self.bounded(limit)?;
        self.load_user(id).await?;
        self.store.notifications(id, limit).await
    }

    fn bounded(&self, limit: usize) -> Result<usize> {
        if limit == 0 {
            return Err(LedgerError::Validation(
                "limit must be at least 1".to_string(),
            ));
        }
        Ok(limit.min(self.config.history_limit))
    }

    async fn load_user(&self, id: &UserId) -> Result<Versioned<User>> {
        self.store
            .user(id)
            .await?
            .ok_or(LedgerError::UserNotFound(*id))
    }
}
