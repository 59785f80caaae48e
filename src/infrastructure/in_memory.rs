use crate::domain::history::CreditHistoryEntry;
use crate::domain::notification::Notification;
use crate::domain::order::Order;
use crate::domain::ports::{Expected, LedgerStore, Versioned, Write, WriteBatch};
use crate::domain::product::{Product, ProductId};
use crate::domain::settings::Settings;
use crate::domain::user::{User, UserId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    users: HashMap<UserId, Versioned<User>>,
    products: HashMap<ProductId, Versioned<Product>>,
    settings: Option<Versioned<Settings>>,
    history: HashMap<UserId, Vec<CreditHistoryEntry>>,
    orders: HashMap<UserId, Vec<Order>>,
    notifications: HashMap<UserId, Vec<Notification>>,
    /// Last creation sequence handed out to a product.
    product_sequence: u64,
}

impl State {
    fn check(&self, write: &Write) -> Result<()> {
        let holds = match write {
            Write::PutUser { user, expected } => {
                let current = self.users.get(&user.id).map(|u| u.version);
                if expected.matches(current) && current.is_none() {
                    self.check_unique(user)?;
                }
                expected.matches(current)
            }
            Write::PutProduct { product, expected } => {
                expected.matches(self.products.get(&product.id).map(|p| p.version))
            }
            Write::DeleteProduct { id, expected } => {
                expected.matches(self.products.get(id).map(|p| p.version))
            }
            Write::PutSettings { expected, .. } => {
                expected.matches(self.settings.as_ref().map(|s| s.version))
            }
            Write::AppendHistory(_) | Write::InsertOrder(_) | Write::InsertNotification(_) => true,
        };
        if holds {
            Ok(())
        } else {
            Err(LedgerError::Conflict)
        }
    }

    fn check_unique(&self, user: &User) -> Result<()> {
        let taken = self
            .users
            .values()
            .any(|u| u.doc.username == user.username || u.doc.email == user.email);
        if taken {
            Err(LedgerError::DuplicateUser(user.username.clone()))
        } else {
            Ok(())
        }
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::PutUser { user, expected } => {
                self.users
                    .insert(user.id, Versioned::new(expected.next_version(), user));
            }
            Write::PutProduct {
                mut product,
                expected,
            } => {
                if expected == Expected::Absent {
                    self.product_sequence += 1;
                    product.sequence = self.product_sequence;
                }
                self.products
                    .insert(product.id, Versioned::new(expected.next_version(), product));
            }
            Write::DeleteProduct { id, .. } => {
                self.products.remove(&id);
            }
            Write::PutSettings { settings, expected } => {
                self.settings = Some(Versioned::new(expected.next_version(), settings));
            }
            Write::AppendHistory(entry) => {
                self.history.entry(entry.user_id).or_default().push(entry);
            }
            Write::InsertOrder(order) => {
                self.orders.entry(order.user_id).or_default().push(order);
            }
            Write::InsertNotification(notification) => {
                self.notifications
                    .entry(notification.user_id)
                    .or_default()
                    .push(notification);
            }
        }
    }
}

fn newest_first<T: Clone>(records: Option<&Vec<T>>, limit: usize) -> Vec<T> {
    records
        .map(|r| r.iter().rev().take(limit).cloned().collect())
        .unwrap_or_default()
}

/// A thread-safe in-memory ledger store.
///
/// All collections live behind one `Arc<RwLock<..>>`. A commit validates every
/// expectation and applies every write while holding the write lock, so readers
/// never observe half of a batch. Ideal for tests or when persistence is not
/// required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn user(&self, id: &UserId) -> Result<Option<Versioned<User>>> {
        let state = self.state.read().await;
        Ok(state.users.get(id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<Versioned<User>>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.doc.username == username)
            .cloned())
    }

    async fn users(&self) -> Result<Vec<Versioned<User>>> {
        let state = self.state.read().await;
        let mut users: Vec<_> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.doc.username.cmp(&b.doc.username));
        Ok(users)
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Versioned<Product>>> {
        let state = self.state.read().await;
        Ok(state.products.get(id).cloned())
    }

    async fn products(&self) -> Result<Vec<Versioned<Product>>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by_key(|p| p.doc.sequence);
        Ok(products)
    }

    async fn settings(&self) -> Result<Option<Versioned<Settings>>> {
        let state = self.state.read().await;
        Ok(state.settings.clone())
    }

    async fn history(&self, user: &UserId, limit: usize) -> Result<Vec<CreditHistoryEntry>> {
        let state = self.state.read().await;
        Ok(newest_first(state.history.get(user), limit))
    }

    async fn orders(&self, user: &UserId, limit: usize) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(newest_first(state.orders.get(user), limit))
    }

    async fn notifications(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(newest_first(state.notifications.get(user), limit))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.write().await;
        for write in batch.writes() {
            state.check(write)?;
        }
        for write in batch.into_writes() {
            state.apply(write);
        }
        Ok(())
    }
}
