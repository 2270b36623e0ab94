use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use super::{codes, PortfolioFilter, PortfolioStore, StoreError};
use crate::db::portfolio_queries;
use crate::models::{NewPortfolio, Portfolio};

/// `PortfolioStore` backed by the `portfolios` table in Postgres.
#[derive(Clone)]
pub struct PgPortfolioStore {
    pool: PgPool,
}

impl PgPortfolioStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortfolioStore for PgPortfolioStore {
    async fn insert_one(&self, portfolio: NewPortfolio) -> Result<Uuid, StoreError> {
        portfolio_queries::insert(&self.pool, portfolio)
            .await
            .map_err(StoreError::from)
    }

    async fn insert_many(&self, portfolios: &[NewPortfolio]) -> Result<Vec<Uuid>, StoreError> {
        let total = portfolios.len();
        let (ids, inserted) = portfolio_queries::insert_many(&self.pool, portfolios).await?;
        if inserted as usize != total {
            error!("Bulk insert wrote {} of {} portfolios", inserted, total);
            return Err(StoreError::PartialFailure {
                succeeded: inserted as usize,
                total,
                errors: vec![format!("{} rows were not written", total - inserted as usize)],
            });
        }
        debug!("Inserted {} portfolios", total);
        Ok(ids)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Portfolio>, StoreError> {
        Ok(portfolio_queries::fetch_one(&self.pool, id).await?)
    }

    async fn find(
        &self,
        filter: &PortfolioFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Portfolio>, StoreError> {
        Ok(portfolio_queries::search(&self.pool, filter, offset, limit).await?)
    }

    async fn count(&self, filter: &PortfolioFilter) -> Result<i64, StoreError> {
        Ok(portfolio_queries::count(&self.pool, filter).await?)
    }

    async fn update_one(&self, portfolio: &Portfolio) -> Result<u64, StoreError> {
        Ok(portfolio_queries::update(&self.pool, portfolio).await?)
    }

    async fn delete_one(&self, id: Uuid) -> Result<u64, StoreError> {
        Ok(portfolio_queries::delete(&self.pool, id).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::PoolTimedOut => {
                StoreError::ServerSelectionTimeout("timed out waiting for a pooled connection".into())
            }
            sqlx::Error::PoolClosed => StoreError::ConnectionFailure("connection pool is closed".into()),
            sqlx::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                StoreError::NetworkTimeout(e.to_string())
            }
            sqlx::Error::Io(e) => StoreError::ConnectionFailure(e.to_string()),
            sqlx::Error::Tls(e) => StoreError::ConnectionFailure(e.to_string()),
            sqlx::Error::WorkerCrashed => StoreError::AutoReconnect("database worker crashed".into()),
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code().as_deref() {
                    Some(code) => from_sqlstate(code, message),
                    None => StoreError::Other(message),
                }
            }
            other => StoreError::Other(other.to_string()),
        }
    }
}

fn from_sqlstate(sqlstate: &str, message: String) -> StoreError {
    match sqlstate {
        "23505" => StoreError::DuplicateKey(message),
        "57014" => StoreError::operation(codes::MAX_TIME_EXPIRED, message),
        "53200" => StoreError::operation(codes::EXCEEDED_MEMORY_LIMIT, message),
        "22P02" => StoreError::operation(codes::FAILED_TO_PARSE, message),
        "42804" => StoreError::operation(codes::TYPE_MISMATCH, message),
        "22023" => StoreError::operation(codes::BAD_VALUE, message),
        "42501" => StoreError::operation(codes::UNAUTHORIZED, message),
        "28000" | "28P01" => StoreError::operation(codes::AUTHENTICATION_FAILED, message),
        "57P01" | "57P02" => StoreError::AutoReconnect(message),
        s if s.starts_with("08") => StoreError::ConnectionFailure(message),
        s if s.starts_with("23") => StoreError::Write(message),
        _ => StoreError::Other(format!("{} ({})", message, sqlstate)),
    }
}
