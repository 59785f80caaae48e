use crate::domain::settings::Settings;

/// Engine tuning and first-start seed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// How many times an operation that lost an optimistic race is retried
    /// from a fresh snapshot before `Conflict` is returned.
    pub max_conflict_retries: u32,
    /// Upper bound for history, order and notification queries.
    pub history_limit: usize,
    pub bootstrap: BootstrapConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 8,
            history_limit: 100,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// What `bootstrap` writes into an empty store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_email: String,
    pub admin_balance: u64,
    pub settings: Settings,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_email: "admin@localhost".to_string(),
            admin_balance: 999_999,
            settings: Settings::default(),
        }
    }
}
