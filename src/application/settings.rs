use super::retry::retry_on_conflict;
use crate::config::LedgerConfig;
use crate::domain::ports::{Expected, LedgerStore, StoreHandle, WriteBatch};
use crate::domain::settings::{Settings, SettingsPatch};
use crate::domain::user::Principal;
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Reads the settings singleton, falling back to the configured defaults when
/// it has never been written.
pub(crate) async fn load(
    store: &dyn LedgerStore,
    config: &LedgerConfig,
) -> Result<(Expected, Settings)> {
    Ok(match store.settings().await? {
        Some(current) => (current.expected(), current.into_doc()),
        None => (Expected::Absent, config.bootstrap.settings.clone()),
    })
}

/// Admin access to the global settings document.
///
/// Updates merge the supplied fields into the stored document.
#[derive(Clone)]
pub struct SettingsService {
    store: StoreHandle,
    config: Arc<LedgerConfig>,
}

impl SettingsService {
    pub fn new(store: StoreHandle, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    pub async fn get(&self) -> Result<Settings> {
        let (_, settings) = load(self.store.as_ref(), &self.config).await?;
        Ok(settings)
    }

    pub async fn update(&self, actor: &Principal, patch: SettingsPatch) -> Result<Settings> {
        actor.require_admin("updating settings")?;
        let settings = retry_on_conflict(self.config.max_conflict_retries, "update_settings", || {
            self.try_update(&patch)
        })
        .await?;
        info!(
            admin = %actor.user_id,
            credit_amount = settings.credit_amount,
            credit_interval_secs = settings.credit_interval_secs,
            "settings updated"
        );
        Ok(settings)
    }

    async fn try_update(&self, patch: &SettingsPatch) -> Result<Settings> {
        let (expected, current) = load(self.store.as_ref(), &self.config).await?;
        let merged = patch.merge(&current)?;
        self.store
            .commit(WriteBatch::new().put_settings(merged.clone(), expected))
            .await?;
        Ok(merged)
    }
}
