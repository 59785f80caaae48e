use crate::config::LedgerConfig;
use crate::domain::clock::Clock;
use crate::domain::history::{CreditHistoryEntry, EntryReason};
use crate::domain::ports::{Expected, LedgerStore, WriteBatch};
use crate::domain::user::{NewUser, Role, User};
use crate::error::{LedgerError, Result};
use tracing::info;

/// Seeds the settings singleton and the admin account if they are missing.
///
/// Safe to run on every start and from several processes at once: whoever
/// loses the race to create a document adopts the winner's.
pub async fn bootstrap(
    store: &dyn LedgerStore,
    clock: &dyn Clock,
    config: &LedgerConfig,
) -> Result<User> {
    let seed = &config.bootstrap;

    if store.settings().await?.is_none() {
        seed.settings.validate()?;
        match store
            .commit(WriteBatch::new().put_settings(seed.settings.clone(), Expected::Absent))
            .await
        {
            Ok(()) => info!(
                credit_amount = seed.settings.credit_amount,
                credit_interval_secs = seed.settings.credit_interval_secs,
                "seeded default settings"
            ),
            Err(LedgerError::Conflict) => {}
            Err(e) => return Err(e),
        }
    }

    if let Some(existing) = store.user_by_username(&seed.admin_username).await? {
        return adopt(existing.into_doc());
    }

    let input = NewUser {
        username: seed.admin_username.clone(),
        email: seed.admin_email.clone(),
        display_name: "Administrator".to_string(),
    };
    input.validate()?;

    let mut admin = User::new(input, Role::Admin, clock.now());
    let applied = admin.adjust(i64::try_from(seed.admin_balance).unwrap_or(i64::MAX));
    let mut batch = WriteBatch::new().put_user(admin.clone(), Expected::Absent);
    if applied != 0 {
        batch = batch.append_history(CreditHistoryEntry::new(
            admin.id,
            applied,
            EntryReason::Bootstrap,
            admin.updated_at,
        ));
    }

    match store.commit(batch).await {
        Ok(()) => {
            info!(username = %admin.username, balance = %admin.balance, "seeded admin account");
            Ok(admin)
        }
        Err(LedgerError::DuplicateUser(name)) => store
            .user_by_username(&seed.admin_username)
            .await?
            .ok_or(LedgerError::DuplicateUser(name))
            .and_then(|winner| adopt(winner.into_doc())),
        Err(e) => Err(e),
    }
}

/// An account already holding the admin username only counts if it is an admin.
fn adopt(existing: User) -> Result<User> {
    if existing.role == Role::Admin {
        Ok(existing)
    } else {
        Err(LedgerError::Validation(format!(
            "{} is already registered without the admin role",
            existing.username
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::user::Credits;
    use crate::infrastructure::in_memory::InMemoryStore;

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let store = InMemoryStore::new();
        let clock = ManualClock::default();
        let config = LedgerConfig::default();

        let first = bootstrap(&store, &clock, &config).await.unwrap();
        let second = bootstrap(&store, &clock, &config).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Admin);
        assert_eq!(first.balance, Credits::new(999_999));
        assert_eq!(store.users().await.unwrap().len(), 1);
        assert_eq!(store.settings().await.unwrap().unwrap().version, 1);

        let history = store.history(&first.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 999_999);
        assert_eq!(history[0].reason, "bootstrap");
    }

    #[tokio::test]
    async fn test_bootstrap_refuses_regular_user_with_admin_name() {
        let store = InMemoryStore::new();
        let clock = ManualClock::default();
        let config = LedgerConfig::default();

        let squatter = User::new(
            NewUser::new("admin", "someone@example.com"),
            Role::User,
            clock.now(),
        );
        store
            .commit(WriteBatch::new().put_user(squatter, Expected::Absent))
            .await
            .unwrap();

        let result = bootstrap(&store, &clock, &config).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(store.users().await.unwrap().len(), 1);
    }
}
