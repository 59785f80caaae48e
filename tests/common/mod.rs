#![allow(dead_code)]

use async_trait::async_trait;
use credits_ledger::application::engine::EconomyEngine;
use credits_ledger::config::LedgerConfig;
use credits_ledger::domain::clock::ManualClock;
use credits_ledger::domain::history::CreditHistoryEntry;
use credits_ledger::domain::notification::Notification;
use credits_ledger::domain::order::Order;
use credits_ledger::domain::ports::{LedgerStore, StoreHandle, Versioned, WriteBatch};
use credits_ledger::domain::product::{NewProduct, Product, ProductId};
use credits_ledger::domain::settings::Settings;
use credits_ledger::domain::user::{NewUser, Principal, User, UserId};
use credits_ledger::error::{LedgerError, Result};
use credits_ledger::infrastructure::in_memory::InMemoryStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Harness {
    pub engine: EconomyEngine,
    pub clock: Arc<ManualClock>,
    pub admin: Principal,
}

impl Harness {
    pub async fn with_store(store: StoreHandle) -> Self {
        let clock = Arc::new(ManualClock::default());
        let engine = EconomyEngine::new(store, clock.clone(), LedgerConfig::default());
        let admin = engine.bootstrap().await.unwrap().principal();
        Self {
            engine,
            clock,
            admin,
        }
    }

    pub async fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new())).await
    }

    pub async fn user(&self, name: &str, balance: i64) -> User {
        let user = self
            .engine
            .ledger()
            .register(NewUser::new(name, format!("{name}@example.com")))
            .await
            .unwrap();
        if balance != 0 {
            self.engine
                .ledger()
                .admin_adjust(&self.admin, &user.id, balance, "seed")
                .await
                .unwrap();
        }
        user
    }

    pub async fn product(&self, name: &str, price: u64, stock: u64) -> Product {
        self.engine
            .catalog()
            .create_product(
                &self.admin,
                NewProduct {
                    name: name.to_string(),
                    description: String::new(),
                    price,
                    stock,
                },
            )
            .await
            .unwrap()
    }

    /// Balance equals the history sum for every user, and no stock is negative.
    pub async fn assert_consistent(&self) {
        for audit in self.engine.audit().await.unwrap() {
            assert!(
                audit.is_consistent(),
                "{} has balance {} but history sums to {}",
                audit.username,
                audit.balance,
                audit.history_total
            );
        }
    }
}

/// Wraps an in-memory store and fails every commit while `down` is set.
#[derive(Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    down: AtomicBool,
}

impl FaultyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn user(&self, id: &UserId) -> Result<Option<Versioned<User>>> {
        self.inner.user(id).await
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<Versioned<User>>> {
        self.inner.user_by_username(username).await
    }

    async fn users(&self) -> Result<Vec<Versioned<User>>> {
        self.inner.users().await
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Versioned<Product>>> {
        self.inner.product(id).await
    }

    async fn products(&self) -> Result<Vec<Versioned<Product>>> {
        self.inner.products().await
    }

    async fn settings(&self) -> Result<Option<Versioned<Settings>>> {
        self.inner.settings().await
    }

    async fn history(&self, user: &UserId, limit: usize) -> Result<Vec<CreditHistoryEntry>> {
        self.inner.history(user, limit).await
    }

    async fn orders(&self, user: &UserId, limit: usize) -> Result<Vec<Order>> {
        self.inner.orders(user, limit).await
    }

    async fn notifications(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>> {
        self.inner.notifications(user, limit).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(LedgerError::store(std::io::Error::other("store offline")));
        }
        self.inner.commit(batch).await
    }
}
