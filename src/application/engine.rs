use super::bootstrap::bootstrap;
use super::catalog::CatalogEngine;
use super::ledger::LedgerEngine;
use super::settings::SettingsService;
use crate::config::LedgerConfig;
use crate::domain::clock::Clock;
use crate::domain::ports::StoreHandle;
use crate::domain::user::{Credits, Role, User, UserId};
use crate::error::Result;
use serde::Serialize;
use std::sync::Arc;

/// One user's balance next to the sum of their history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountAudit {
    #[serde(skip)]
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub balance: Credits,
    pub history_total: i64,
}

impl AccountAudit {
    pub fn is_consistent(&self) -> bool {
        u64::try_from(self.history_total).is_ok_and(|total| total == self.balance.value())
    }
}

/// The main entry point of the economy.
///
/// `EconomyEngine` wires the ledger, the catalog and the settings service to
/// one store, one clock and one configuration.
#[derive(Clone)]
pub struct EconomyEngine {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    config: Arc<LedgerConfig>,
    ledger: LedgerEngine,
    catalog: CatalogEngine,
    settings: SettingsService,
}

impl EconomyEngine {
    /// Creates a new `EconomyEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - Storage shared by every component.
    /// * `clock` - Time source for cooldowns and record timestamps.
    /// * `config` - Retry, query and bootstrap tuning.
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        let config = Arc::new(config);
        Self {
            ledger: LedgerEngine::new(store.clone(), clock.clone(), config.clone()),
            catalog: CatalogEngine::new(store.clone(), clock.clone(), config.clone()),
            settings: SettingsService::new(store.clone(), config.clone()),
            store,
            clock,
            config,
        }
    }

    /// Seeds settings and the admin account; returns the admin.
    pub async fn bootstrap(&self) -> Result<User> {
        bootstrap(self.store.as_ref(), self.clock.as_ref(), &self.config).await
    }

    pub fn ledger(&self) -> &LedgerEngine {
        &self.ledger
    }

    pub fn catalog(&self) -> &CatalogEngine {
        &self.catalog
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    /// Balance and history total for every user, ordered by username.
    pub async fn audit(&self) -> Result<Vec<AccountAudit>> {
        let mut audits = Vec::new();
        for user in self.store.users().await? {
            let user = user.into_doc();
            let history_total = self
                .store
                .history(&user.id, usize::MAX)
                .await?
                .iter()
                .map(|entry| entry.amount)
                .sum();
            audits.push(AccountAudit {
                user_id: user.id,
                username: user.username,
                role: user.role,
                balance: user.balance,
                history_total,
            });
        }
        Ok(audits)
    }
}
