//! SQLite-backed portfolio store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tracing::{debug, error};

use super::DbPool;
use crate::domain::entities::snapshot::PortfolioSnapshot;
use crate::domain::entities::trade::{TradeLogEntry, TradeSide};
use crate::domain::repositories::portfolio_store::{PortfolioStore, StoreError, StoreResult};

pub struct SqlitePortfolioStore {
    pool: DbPool,
}

impl SqlitePortfolioStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortfolioStore for SqlitePortfolioStore {
    async fn load(&self, id: &str) -> StoreResult<Option<PortfolioSnapshot>> {
        let row = sqlx::query("SELECT snapshot FROM portfolios WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to load portfolio {}: {}", id, e);
                StoreError::Backend(e.to_string())
            })?;

        match row {
            Some(row) => {
                let raw: String = row.get("snapshot");
                let snapshot =
                    serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                        id: id.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str, snapshot: &PortfolioSnapshot) -> StoreResult<()> {
        let raw = serde_json::to_string(snapshot).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        sqlx::query(
            r#"
            INSERT INTO portfolios (id, snapshot, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET snapshot = ?2, updated_at = ?3
            "#,
        )
        .bind(id)
        .bind(&raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save portfolio {}: {}", id, e);
            StoreError::Backend(e.to_string())
        })?;

        debug!("Saved portfolio {}", id);
        Ok(())
    }

    async fn append_trade_log(&self, entry: &TradeLogEntry) -> StoreResult<()> {
        let side = match entry.side {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        };
        sqlx::query(
            r#"
            INSERT INTO trade_log (position_id, symbol, side, shares, price, position_size, executed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.position_id)
        .bind(&entry.symbol)
        .bind(side)
        .bind(entry.shares)
        .bind(entry.price)
        .bind(&entry.position_size)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to log trade for {}: {}", entry.position_id, e);
            StoreError::Backend(e.to_string())
        })?;
        Ok(())
    }
}
