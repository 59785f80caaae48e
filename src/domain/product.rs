use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProductId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Price in credits.
    pub price: u64,
    pub stock: u64,
    pub created_at: DateTime<Utc>,
    /// Creation order. Assigned by the store when the product is inserted.
    #[serde(default)]
    pub sequence: u64,
}

impl Product {
    pub fn new(input: NewProduct, now: DateTime<Utc>) -> Self {
        Self {
            id: ProductId::new(),
            name: input.name,
            description: input.description,
            price: input.price,
            stock: input.stock,
            created_at: now,
            sequence: 0,
        }
    }

    /// Takes one unit out of stock.
    pub fn take_one(&mut self) -> Result<()> {
        match self.stock.checked_sub(1) {
            Some(stock) => {
                self.stock = stock;
                Ok(())
            }
            None => Err(LedgerError::OutOfStock(self.id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: u64,
    pub stock: u64,
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// Partial product edit. Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub stock: Option<u64>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(LedgerError::Validation(
                "Product update contains no fields".to_string(),
            ));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        Ok(())
    }

    pub fn apply(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            product.description.clone_from(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(LedgerError::Validation(
            "Product name must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: u64) -> Product {
        Product::new(
            NewProduct {
                name: "Hat".to_string(),
                description: String::new(),
                price: 50,
                stock,
            },
            DateTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn test_take_one_never_goes_negative() {
        let mut p = product(1);
        assert!(p.take_one().is_ok());
        assert_eq!(p.stock, 0);
        assert!(matches!(p.take_one(), Err(LedgerError::OutOfStock(_))));
        assert_eq!(p.stock, 0);
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut p = product(3);
        let patch = ProductPatch {
            price: Some(75),
            ..Default::default()
        };
        patch.apply(&mut p);
        assert_eq!(p.price, 75);
        assert_eq!(p.stock, 3);
        assert_eq!(p.name, "Hat");
    }

    #[test]
    fn test_patch_validation() {
        assert!(ProductPatch::default().validate().is_err());
        let blank = ProductPatch {
            name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let result: std::result::Result<ProductPatch, _> =
            serde_json::from_str(r#"{"prize": 10}"#);
        assert!(result.is_err());
    }
}
