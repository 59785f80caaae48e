use crate::domain::product::ProductId;
use crate::domain::user::UserId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Username or email already registered: {0}")]
    DuplicateUser(String),
    #[error("User not found: {0}")]
    UserNotFound(UserId),
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),
    #[error("No user named {0}")]
    UnknownUser(String),
    #[error("No product named {0}")]
    UnknownProduct(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Rate limited: retry in {remaining_seconds} seconds")]
    RateLimited { remaining_seconds: u64 },
    #[error("Product {0} is out of stock")]
    OutOfStock(ProductId),
    #[error("Insufficient credits: have {available}, need {required}")]
    InsufficientCredits { available: u64, required: u64 },
    #[error("Concurrent update conflict, retry the operation")]
    Conflict,
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by callers to map failures onto their transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    RateLimited,
    /// Expected business outcome: the request was well-formed but refused.
    Rejected,
    Conflict,
    StoreUnavailable,
}

impl LedgerError {
    pub fn store<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::StoreUnavailable(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::DuplicateUser(_) | Self::Csv(_) => ErrorKind::Validation,
            Self::UserNotFound(_)
            | Self::ProductNotFound(_)
            | Self::UnknownUser(_)
            | Self::UnknownProduct(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::OutOfStock(_) | Self::InsufficientCredits { .. } => ErrorKind::Rejected,
            Self::Conflict => ErrorKind::Conflict,
            Self::StoreUnavailable(_) | Self::Io(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// True for outcomes that are part of normal operation rather than failures.
    pub fn is_business_outcome(&self) -> bool {
        matches!(self.kind(), ErrorKind::RateLimited | ErrorKind::Rejected)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::Conflict | ErrorKind::StoreUnavailable
        )
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::store(err)
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        Self::store(err)
    }
}
