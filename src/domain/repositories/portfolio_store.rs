//! Persistence port for the portfolio.
//!
//! The stored record is opaque to the backend: one snapshot per portfolio
//! id, plus an append-only trade log for auditing.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::snapshot::PortfolioSnapshot;
use crate::domain::entities::trade::TradeLogEntry;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt portfolio record for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn load(&self, id: &str) -> StoreResult<Option<PortfolioSnapshot>>;

    async fn save(&self, id: &str, snapshot: &PortfolioSnapshot) -> StoreResult<()>;

    async fn append_trade_log(&self, entry: &TradeLogEntry) -> StoreResult<()>;
}
