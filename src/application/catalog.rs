use super::retry::retry_on_conflict;
use crate::config::LedgerConfig;
use crate::domain::clock::Clock;
use crate::domain::history::{CreditHistoryEntry, EntryReason};
use crate::domain::notification::Notification;
use crate::domain::order::Order;
use crate::domain::ports::{Expected, StoreHandle, Versioned, WriteBatch};
use crate::domain::product::{NewProduct, Product, ProductId, ProductPatch};
use crate::domain::user::{Credits, Principal, UserId};
use crate::error::{LedgerError, Result};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub remaining_balance: Credits,
    pub order_id: Uuid,
}

/// The shop: product management and the purchase transaction.
#[derive(Clone)]
pub struct CatalogEngine {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    config: Arc<LedgerConfig>,
}

impl CatalogEngine {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>, config: Arc<LedgerConfig>) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Exchanges credits for one unit of a product.
    ///
    /// The balance debit, the stock decrement, the order, the history entry and
    /// the notification are committed as a single batch conditional on the
    /// versions of the user and product that the checks ran against.
    pub async fn purchase(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<PurchaseReceipt> {
        let result = retry_on_conflict(self.config.max_conflict_retries, "purchase", || {
            self.try_purchase(user_id, product_id)
        })
        .await;
        match &result {
            Ok(receipt) => info!(
                user = %user_id,
                product = %product_id,
                order = %receipt.order_id,
                balance = %receipt.remaining_balance,
                "purchase completed"
            ),
            Err(e) if e.is_business_outcome() => {
                debug!(user = %user_id, product = %product_id, reason = %e, "purchase refused")
            }
            Err(_) => {}
        }
        result
    }

    async fn try_purchase(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<PurchaseReceipt> {
        let product = self.load_product(product_id).await?;
        if product.doc.stock == 0 {
            return Err(LedgerError::OutOfStock(*product_id));
        }
        let user = self
            .store
            .user(user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(*user_id))?;

        let (product_version, mut product) = (product.expected(), product.into_doc());
        let (user_version, mut user) = (user.expected(), user.into_doc());

        let at = user.stamp(self.clock.now());
        let applied = user.spend(product.price)?;
        product.take_one()?;

        let order = Order::for_product(user.id, &product, at);
        let receipt = PurchaseReceipt {
            remaining_balance: user.balance,
            order_id: order.id,
        };
        let entry = CreditHistoryEntry::new(
            user.id,
            applied,
            EntryReason::Purchase {
                product_name: &product.name,
            },
            at,
        );
        let notification = Notification::new(
            user.id,
            format!("You bought {} for {} credits", product.name, product.price),
            at,
        );

        self.store
            .commit(
                WriteBatch::new()
                    .put_user(user, user_version)
                    .put_product(product, product_version)
                    .insert_order(order)
                    .append_history(entry)
                    .notify(notification),
            )
            .await?;
        Ok(receipt)
    }

    pub async fn product(&self, id: &ProductId) -> Result<Product> {
        Ok(self.load_product(id).await?.into_doc())
    }

    pub async fn product_by_name(&self, name: &str) -> Result<Product> {
        self.products()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| LedgerError::UnknownProduct(name.to_string()))
    }

    /// All products, oldest first.
    pub async fn products(&self) -> Result<Vec<Product>> {
        let products = self.store.products().await?;
        Ok(products.into_iter().map(Versioned::into_doc).collect())
    }

    pub async fn create_product(&self, actor: &Principal, input: NewProduct) -> Result<Product> {
        actor.require_admin("creating products")?;
        input.validate()?;
        let product = Product::new(input, self.clock.now());
        let id = product.id;
        self.store
            .commit(WriteBatch::new().put_product(product, Expected::Absent))
            .await?;
        // Re-read so the caller sees the sequence the store assigned.
        let product = self.product(&id).await?;
        info!(
            product = %product.id,
            name = %product.name,
            price = product.price,
            stock = product.stock,
            "product created"
        );
        Ok(product)
    }

    /// Merges `patch` into the stored product.
    pub async fn update_product(
        &self,
        actor: &Principal,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<Product> {
        actor.require_admin("updating products")?;
        patch.validate()?;
        let product = retry_on_conflict(self.config.max_conflict_retries, "update_product", || {
            self.try_update_product(id, &patch)
        })
        .await?;
        info!(product = %id, "product updated");
        Ok(product)
    }

    /// Removes a product. Existing orders keep their name snapshot.
    pub async fn delete_product(&self, actor: &Principal, id: &ProductId) -> Result<()> {
        actor.require_admin("deleting products")?;
        retry_on_conflict(self.config.max_conflict_retries, "delete_product", || {
            self.try_delete_product(id)
        })
        .await?;
        info!(product = %id, "product deleted");
        Ok(())
    }

    async fn try_update_product(&self, id: &ProductId, patch: &ProductPatch) -> Result<Product> {
        let current = self.load_product(id).await?;
        let expected = current.expected();
        let mut product = current.into_doc();
        patch.apply(&mut product);
        self.store
            .commit(WriteBatch::new().put_product(product.clone(), expected))
            .await?;
        Ok(product)
    }

    async fn try_delete_product(&self, id: &ProductId) -> Result<()> {
        let current = self.load_product(id).await?;
        self.store
            .commit(WriteBatch::new().delete_product(*id, current.expected()))
            .await
    }

    /// The user's most recent orders, newest first.
    pub async fn orders(&self, user_id: &UserId, limit: usize) -> Result<Vec<Order>> {
        if limit == 0 {
            return Err(LedgerError::Validation(
                "limit must be at least 1".to_string(),
            ));
        }
        if self.store.user(user_id).await?.is_none() {
            return Err(LedgerError::UserNotFound(*user_id));
        }
        self.store
            .orders(user_id, limit.min(self.config.history_limit))
            .await
    }

    async fn load_product(&self, id: &ProductId) -> Result<Versioned<Product>> {
        self.store
            .product(id)
            .await?
            .ok_or(LedgerError::ProductNotFound(*id))
    }
}
