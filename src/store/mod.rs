use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewPortfolio, Portfolio};

mod memory;
mod postgres;

pub use memory::{InMemoryPortfolioStore, StoreOperation};
pub use postgres::PgPortfolioStore;

/// Numeric failure codes carried by `StoreError::OperationFailure`.
pub mod codes {
    pub const BAD_VALUE: i32 = 2;
    pub const FAILED_TO_PARSE: i32 = 9;
    pub const UNAUTHORIZED: i32 = 13;
    pub const TYPE_MISMATCH: i32 = 14;
    pub const AUTHENTICATION_FAILED: i32 = 18;
    pub const CONFLICTING_UPDATE: i32 = 40;
    pub const MAX_TIME_EXPIRED: i32 = 50;
    pub const INVALID_OPTIONS: i32 = 72;
    pub const NETWORK_TIMEOUT: i32 = 89;
    pub const EXCEEDED_MEMORY_LIMIT: i32 = 146;
    pub const NETWORK_INTERFACE_EXCEEDED_TIME_LIMIT: i32 = 202;
    pub const QUERY_EXCEEDED_MEMORY_LIMIT: i32 = 216;
    pub const EXCEEDED_TIME_LIMIT: i32 = 262;
    pub const DUPLICATE_KEY: i32 = 11000;
    pub const DUPLICATE_KEY_LEGACY: i32 = 11001;
    pub const BAD_VALUE_LEGACY: i32 = 16500;

    pub const TIMEOUT_FAMILY: &[i32] = &[
        MAX_TIME_EXPIRED,
        NETWORK_TIMEOUT,
        NETWORK_INTERFACE_EXCEEDED_TIME_LIMIT,
        EXCEEDED_TIME_LIMIT,
    ];

    pub const MEMORY_LIMIT_FAMILY: &[i32] = &[EXCEEDED_MEMORY_LIMIT, QUERY_EXCEEDED_MEMORY_LIMIT];

    pub const NON_RECOVERABLE: &[i32] = &[
        DUPLICATE_KEY,
        DUPLICATE_KEY_LEGACY,
        BAD_VALUE,
        BAD_VALUE_LEGACY,
        TYPE_MISMATCH,
        FAILED_TO_PARSE,
        CONFLICTING_UPDATE,
        INVALID_OPTIONS,
        UNAUTHORIZED,
        AUTHENTICATION_FAILED,
    ];
}

/// Driver-level failures reported by a `PortfolioStore`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("connection failure: {0}")]
    ConnectionFailure(String),
    #[error("server selection timed out: {0}")]
    ServerSelectionTimeout(String),
    #[error("network timeout: {0}")]
    NetworkTimeout(String),
    #[error("connection reset, reconnect required: {0}")]
    AutoReconnect(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("write error: {0}")]
    Write(String),
    #[error("operation failed (code {code}): {message}")]
    OperationFailure { code: i32, message: String },
    #[error("bulk insert partially failed: {succeeded}/{total} succeeded")]
    PartialFailure {
        succeeded: usize,
        total: usize,
        errors: Vec<String>,
    },
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn operation(code: i32, message: impl Into<String>) -> Self {
        StoreError::OperationFailure {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortfolioFilter {
    All,
    /// Case-insensitive exact match.
    ExactName(String),
    /// Case-insensitive substring match.
    NameContains(String),
}

impl PortfolioFilter {
    pub fn from_search(name: Option<&str>, name_like: Option<&str>) -> Self {
        match (name, name_like) {
            (Some(name), _) => PortfolioFilter::ExactName(name.to_string()),
            (None, Some(fragment)) => PortfolioFilter::NameContains(fragment.to_string()),
            (None, None) => PortfolioFilter::All,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            PortfolioFilter::All => true,
            PortfolioFilter::ExactName(expected) => name.to_lowercase() == expected.to_lowercase(),
            PortfolioFilter::NameContains(fragment) => {
                name.to_lowercase().contains(&fragment.to_lowercase())
            }
        }
    }
}

/// CRUD surface of the document store. Results of `find` are ordered by
/// `date_created` descending, then `id` descending.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn insert_one(&self, portfolio: NewPortfolio) -> Result<Uuid, StoreError>;

    /// Inserts every document or fails. Ids come back in input order.
    async fn insert_many(&self, portfolios: &[NewPortfolio]) -> Result<Vec<Uuid>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Portfolio>, StoreError>;

    async fn find(
        &self,
        filter: &PortfolioFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Portfolio>, StoreError>;

    async fn count(&self, filter: &PortfolioFilter) -> Result<i64, StoreError>;

    /// Returns the number of rows written.
    async fn update_one(&self, portfolio: &Portfolio) -> Result<u64, StoreError>;

    /// Returns the number of rows removed.
    async fn delete_one(&self, id: Uuid) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        self.count(&PortfolioFilter::All).await.map(|_| ())
    }
}
