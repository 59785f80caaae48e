use super::history::CreditHistoryEntry;
use super::notification::Notification;
use super::order::Order;
use super::product::{Product, ProductId};
use super::settings::Settings;
use super::user::{User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

impl<T> Versioned<T> {
    pub fn new(version: u64, doc: T) -> Self {
        Self { version, doc }
    }

    pub fn expected(&self) -> Expected {
        Expected::Version(self.version)
    }

    pub fn into_doc(self) -> T {
        self.doc
    }
}

/// The state a conditional write requires the stored document to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The document must not exist yet.
    Absent,
    /// The document must exist and still be at this version.
    Version(u64),
}

impl Expected {
    pub fn matches(self, current: Option<u64>) -> bool {
        match (self, current) {
            (Expected::Absent, None) => true,
            (Expected::Version(want), Some(have)) => want == have,
            _ => false,
        }
    }

    /// The version the document has after the write succeeds.
    pub fn next_version(self) -> u64 {
        match self {
            Expected::Absent => 1,
            Expected::Version(v) => v + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    PutUser { user: User, expected: Expected },
    PutProduct { product: Product, expected: Expected },
    DeleteProduct { id: ProductId, expected: Expected },
    PutSettings { settings: Settings, expected: Expected },
    AppendHistory(CreditHistoryEntry),
    InsertOrder(Order),
    InsertNotification(Notification),
}

/// A set of writes that the store applies all together or not at all.
///
/// If any conditional write's expectation does not hold at commit time the
/// store rejects the whole batch with `LedgerError::Conflict`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user(mut self, user: User, expected: Expected) -> Self {
        self.writes.push(Write::PutUser { user, expected });
        self
    }

    pub fn put_product(mut self, product: Product, expected: Expected) -> Self {
        self.writes.push(Write::PutProduct { product, expected });
        self
    }

    pub fn delete_product(mut self, id: ProductId, expected: Expected) -> Self {
        self.writes.push(Write::DeleteProduct { id, expected });
        self
    }

    pub fn put_settings(mut self, settings: Settings, expected: Expected) -> Self {
        self.writes.push(Write::PutSettings { settings, expected });
        self
    }

    pub fn append_history(mut self, entry: CreditHistoryEntry) -> Self {
        self.writes.push(Write::AppendHistory(entry));
        self
    }

    pub fn insert_order(mut self, order: Order) -> Self {
        self.writes.push(Write::InsertOrder(order));
        self
    }

    pub fn notify(mut self, notification: Notification) -> Self {
        self.writes.push(Write::InsertNotification(notification));
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Persistence port for every ledger collection.
///
/// Per-user queries return records newest first, bounded by `limit`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn user(&self, id: &UserId) -> Result<Option<Versioned<User>>>;
    async fn user_by_username(&self, username: &str) -> Result<Option<Versioned<User>>>;
    /// All users, ordered by username.
    async fn users(&self) -> Result<Vec<Versioned<User>>>;

    async fn product(&self, id: &ProductId) -> Result<Option<Versioned<Product>>>;
    /// All products, ordered by creation time.
    async fn products(&self) -> Result<Vec<Versioned<Product>>>;

    async fn settings(&self) -> Result<Option<Versioned<Settings>>>;

    async fn history(&self, user: &UserId, limit: usize) -> Result<Vec<CreditHistoryEntry>>;
    async fn orders(&self, user: &UserId, limit: usize) -> Result<Vec<Order>>;
    async fn notifications(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>>;

    /// Atomically applies `batch`.
    ///
    /// Fails with `Conflict` when an expectation no longer holds and with
    /// `DuplicateUser` when a new user's username or email is taken. Nothing
    /// is written on failure.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

pub type StoreHandle = Arc<dyn LedgerStore>;
