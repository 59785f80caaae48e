use super::product::{Product, ProductId};
use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of a completed purchase.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Order {
    pub id: Uuid,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Product name at the time of purchase.
    pub product_name: String,
    pub credits_spent: u64,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn for_product(user_id: UserId, product: &Product, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id: product.id,
            product_name: product.name.clone(),
            credits_spent: product.price,
            timestamp: at,
        }
    }
}
