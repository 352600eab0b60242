//! Price Oracle port.
//!
//! The ledger treats market data as a fallible, possibly-stale external
//! service: callers decide per call whether a failure is fatal (benchmark,
//! auto-sell pricing) or tolerated (mark refresh).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::position::AssetClass;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Price lookup failed for {symbol}: {reason}")]
    LookupFailed { symbol: String, reason: String },

    #[error("No price data available for {0}")]
    NoData(String),
}

pub type MarketDataResult<T> = Result<T, MarketDataError>;

/// One point of a ticker's daily close series. Extra fields on the wire
/// (open, high, volume, ...) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Time-ordered close history for a symbol.
    async fn price_history(
        &self,
        symbol: &str,
        assetclass: AssetClass,
    ) -> MarketDataResult<Vec<PricePoint>>;

    /// Latest usable close: the last finite positive point of the history.
    async fn latest_close(&self, symbol: &str, assetclass: AssetClass) -> MarketDataResult<f64> {
        let history = self.price_history(symbol, assetclass).await?;
        history
            .iter()
            .rev()
            .map(|p| p.close)
            .find(|c| c.is_finite() && *c > 0.0)
            .ok_or_else(|| MarketDataError::NoData(symbol.to_string()))
    }
}
