use crate::domain::history::CreditHistoryEntry;
use crate::domain::notification::Notification;
use crate::domain::order::Order;
use crate::domain::ports::{Expected, LedgerStore, Versioned, Write, WriteBatch};
use crate::domain::product::{Product, ProductId};
use crate::domain::settings::Settings;
use crate::domain::user::{User, UserId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options,
    WriteBatch as RocksBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for user documents, keyed by user id.
pub const CF_USERS: &str = "users";
/// Column Family for product documents, keyed by product id.
pub const CF_PRODUCTS: &str = "products";
/// Column Family holding the settings singleton.
pub const CF_SETTINGS: &str = "settings";
/// Column Family for credit history, keyed by user id + sequence number.
pub const CF_HISTORY: &str = "history";
/// Column Family for orders, keyed by user id + sequence number.
pub const CF_ORDERS: &str = "orders";
/// Column Family for notifications, keyed by user id + sequence number.
pub const CF_NOTIFICATIONS: &str = "notifications";
/// Column Family mapping usernames and emails to user ids.
pub const CF_USER_INDEX: &str = "user_index";
/// Column Family for store bookkeeping (the append and product sequence).
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_USERS,
    CF_PRODUCTS,
    CF_SETTINGS,
    CF_HISTORY,
    CF_ORDERS,
    CF_NOTIFICATIONS,
    CF_USER_INDEX,
    CF_META,
];

const SETTINGS_KEY: &[u8] = b"global";
const SEQUENCE_KEY: &[u8] = b"sequence";

fn username_key(username: &str) -> Vec<u8> {
    [b"u:".as_slice(), username.as_bytes()].concat()
}

fn email_key(email: &str) -> Vec<u8> {
    [b"e:".as_slice(), email.as_bytes()].concat()
}

/// Key for an append-only record: owner id followed by the big-endian sequence,
/// so a reverse scan over the owner's prefix yields newest first.
fn record_key(owner: &UserId, seq: u64) -> Vec<u8> {
    [owner.as_bytes().as_slice(), &seq.to_be_bytes()].concat()
}

/// A persistent store implementation using RocksDB.
///
/// Each collection lives in its own Column Family. A commit holds the commit
/// mutex while it checks every expected version and then writes the whole
/// batch with a single atomic RocksDB `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    /// Last sequence number handed out to an append-only record.
    sequence: Arc<Mutex<u64>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists and restores the
    /// append sequence from the previous run.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let meta = db
            .cf_handle(CF_META)
            .ok_or_else(|| LedgerError::store("meta column family not found"))?;
        let sequence = match db.get_cf(&meta, SEQUENCE_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LedgerError::store("corrupt sequence record"))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };

        Ok(Self {
            db: Arc::new(db),
            sequence: Arc::new(Mutex::new(sequence)),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::store(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_all<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut docs = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            docs.push(serde_json::from_slice(&value)?);
        }
        Ok(docs)
    }

    fn newest_first<T: DeserializeOwned>(
        &self,
        cf: &str,
        owner: &UserId,
        limit: usize,
    ) -> Result<Vec<T>> {
        let prefix = owner.as_bytes();
        let upper = record_key(owner, u64::MAX);
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(&upper, Direction::Reverse));

        let mut records = Vec::new();
        for item in iter {
            if records.len() >= limit {
                break;
            }
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    fn version_of<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<u64>> {
        Ok(self.get_json::<Versioned<T>>(cf, key)?.map(|d| d.version))
    }

    fn check(&self, write: &Write) -> Result<()> {
        let holds = match write {
            Write::PutUser { user, expected } => {
                let current = self.version_of::<User>(CF_USERS, user.id.as_bytes())?;
                if *expected == Expected::Absent && current.is_none() {
                    let index = self.cf(CF_USER_INDEX)?;
                    if self.db.get_pinned_cf(index, username_key(&user.username))?.is_some()
                        || self.db.get_pinned_cf(index, email_key(&user.email))?.is_some()
                    {
                        return Err(LedgerError::DuplicateUser(user.username.clone()));
                    }
                }
                expected.matches(current)
            }
            Write::PutProduct { product, expected } => {
                expected.matches(self.version_of::<Product>(CF_PRODUCTS, product.id.as_bytes())?)
            }
            Write::DeleteProduct { id, expected } => {
                expected.matches(self.version_of::<Product>(CF_PRODUCTS, id.as_bytes())?)
            }
            Write::PutSettings { expected, .. } => {
                expected.matches(self.version_of::<Settings>(CF_SETTINGS, SETTINGS_KEY)?)
            }
            Write::AppendHistory(_) | Write::InsertOrder(_) | Write::InsertNotification(_) => true,
        };
        if holds {
            Ok(())
        } else {
            Err(LedgerError::Conflict)
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut RocksBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn user(&self, id: &UserId) -> Result<Option<Versioned<User>>> {
        self.get_json(CF_USERS, id.as_bytes())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<Versioned<User>>> {
        let index = self.cf(CF_USER_INDEX)?;
        let Some(raw_id) = self.db.get_cf(index, username_key(username))? else {
            return Ok(None);
        };
        let id = Uuid::from_slice(&raw_id).map_err(LedgerError::store)?;
        self.user(&UserId::from(id)).await
    }

    async fn users(&self) -> Result<Vec<Versioned<User>>> {
        let mut users: Vec<Versioned<User>> = self.scan_all(CF_USERS)?;
        users.sort_by(|a, b| a.doc.username.cmp(&b.doc.username));
        Ok(users)
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Versioned<Product>>> {
        self.get_json(CF_PRODUCTS, id.as_bytes())
    }

    async fn products(&self) -> Result<Vec<Versioned<Product>>> {
        let mut products: Vec<Versioned<Product>> = self.scan_all(CF_PRODUCTS)?;
        products.sort_by_key(|p| p.doc.sequence);
        Ok(products)
    }

    async fn settings(&self) -> Result<Option<Versioned<Settings>>> {
        self.get_json(CF_SETTINGS, SETTINGS_KEY)
    }

    async fn history(&self, user: &UserId, limit: usize) -> Result<Vec<CreditHistoryEntry>> {
        self.newest_first(CF_HISTORY, user, limit)
    }

    async fn orders(&self, user: &UserId, limit: usize) -> Result<Vec<Order>> {
        self.newest_first(CF_ORDERS, user, limit)
    }

    async fn notifications(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>> {
        self.newest_first(CF_NOTIFICATIONS, user, limit)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut sequence = self.sequence.lock().await;
        for write in batch.writes() {
            self.check(write)?;
        }

        let mut next = *sequence;
        let mut rocks = RocksBatch::default();
        for write in batch.into_writes() {
            match write {
                Write::PutUser { user, expected } => {
                    if expected == Expected::Absent {
                        let index = self.cf(CF_USER_INDEX)?;
                        rocks.put_cf(index, username_key(&user.username), user.id.as_bytes());
                        rocks.put_cf(index, email_key(&user.email), user.id.as_bytes());
                    }
                    let key = *user.id.as_bytes();
                    let doc = Versioned::new(expected.next_version(), user);
                    self.put_json(&mut rocks, CF_USERS, &key, &doc)?;
                }
                Write::PutProduct {
                    mut product,
                    expected,
                } => {
                    if expected == Expected::Absent {
                        next += 1;
                        product.sequence = next;
                    }
                    let key = *product.id.as_bytes();
                    let doc = Versioned::new(expected.next_version(), product);
                    self.put_json(&mut rocks, CF_PRODUCTS, &key, &doc)?;
                }
                Write::DeleteProduct { id, .. } => {
                    rocks.delete_cf(self.cf(CF_PRODUCTS)?, id.as_bytes());
                }
                Write::PutSettings { settings, expected } => {
                    let doc = Versioned::new(expected.next_version(), settings);
                    self.put_json(&mut rocks, CF_SETTINGS, SETTINGS_KEY, &doc)?;
                }
                Write::AppendHistory(entry) => {
                    next += 1;
                    let key = record_key(&entry.user_id, next);
                    self.put_json(&mut rocks, CF_HISTORY, &key, &entry)?;
                }
                Write::InsertOrder(order) => {
                    next += 1;
                    let key = record_key(&order.user_id, next);
                    self.put_json(&mut rocks, CF_ORDERS, &key, &order)?;
                }
                Write::InsertNotification(notification) => {
                    next += 1;
                    let key = record_key(&notification.user_id, next);
                    self.put_json(&mut rocks, CF_NOTIFICATIONS, &key, &notification)?;
                }
            }
        }
        rocks.put_cf(self.cf(CF_META)?, SEQUENCE_KEY, next.to_be_bytes());

        self.db.write(rocks)?;
        *sequence = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::EntryReason;
    use crate::domain::product::NewProduct;
    use crate::domain::user::{NewUser, Role};
    use chrono::{DateTime, Duration};
    use tempfile::tempdir;

    fn user(name: &str) -> User {
        User::new(
            NewUser::new(name, format!("{name}@example.com")),
            Role::User,
            DateTime::UNIX_EPOCH,
        )
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_user_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let alice = user("alice");
        store
            .commit(WriteBatch::new().put_user(alice.clone(), Expected::Absent))
            .await
            .unwrap();

        let retrieved = store.user(&alice.id).await.unwrap().unwrap();
        assert_eq!(retrieved, Versioned::new(1, alice.clone()));
        let by_name = store.user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.doc.id, alice.id);

        let duplicate = store
            .commit(WriteBatch::new().put_user(user("alice"), Expected::Absent))
            .await;
        assert!(matches!(duplicate, Err(LedgerError::DuplicateUser(_))));

        let stale = store
            .commit(WriteBatch::new().put_user(alice.clone(), Expected::Version(5)))
            .await;
        assert!(matches!(stale, Err(LedgerError::Conflict)));
        assert_eq!(store.users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_history_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = UserId::new();
        let other = UserId::new();
        let t0 = DateTime::UNIX_EPOCH;

        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            let batch = WriteBatch::new()
                .append_history(CreditHistoryEntry::new(id, 1, EntryReason::AutoEarn, t0))
                .append_history(CreditHistoryEntry::new(other, 9, EntryReason::AutoEarn, t0));
            store.commit(batch).await.unwrap();
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        let later = t0 + Duration::seconds(1);
        let entry = CreditHistoryEntry::new(id, 2, EntryReason::AutoEarn, later);
        store
            .commit(WriteBatch::new().append_history(entry))
            .await
            .unwrap();

        let amounts: Vec<i64> = store
            .history(&id, 10)
            .await
            .unwrap()
            .iter()
            .map(|e| e.amount)
            .collect();
        assert_eq!(amounts, vec![2, 1]);
        assert_eq!(store.history(&id, 1).await.unwrap().len(), 1);
        assert_eq!(store.history(&other, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_products_keep_insert_order_across_reopen() {
        let dir = tempdir().unwrap();
        let product = |name: &str| {
            Product::new(
                NewProduct {
                    name: name.to_string(),
                    description: String::new(),
                    price: 1,
                    stock: 1,
                },
                DateTime::UNIX_EPOCH,
            )
        };

        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            for name in ["Zeta", "Alpha"] {
                store
                    .commit(WriteBatch::new().put_product(product(name), Expected::Absent))
                    .await
                    .unwrap();
            }
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        store
            .commit(WriteBatch::new().put_product(product("Beta"), Expected::Absent))
            .await
            .unwrap();
        let names: Vec<String> = store
            .products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.doc.name)
            .collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Beta"]);
    }
}
