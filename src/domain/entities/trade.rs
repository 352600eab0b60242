use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::snapshot::de_f64;

/// Immutable record of a completed round-trip, created exactly once when a
/// position is fully closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub entry: DateTime<Utc>,
    pub exit: DateTime<Utc>,
    #[serde(deserialize_with = "de_f64")]
    pub entry_price: f64,
    #[serde(deserialize_with = "de_f64")]
    pub exit_price: f64,
    #[serde(deserialize_with = "de_f64")]
    pub shares: f64,
    /// Realized dollar value at close: shares x exit price.
    #[serde(deserialize_with = "de_f64")]
    pub trade_balance: f64,
    /// Realized percentage return locked in at close.
    #[serde(deserialize_with = "de_f64")]
    pub gain_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Append-only audit entry recorded for every committed buy and sell.
///
/// `position_id` ties the event to the position it touched; it repeats
/// when several buys merge into one held position, so it is not a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub position_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub shares: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_size: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_trade_tolerates_string_numbers() {
        let raw = r#"{
            "symbol": "AAPL",
            "entry": "2024-01-05T14:30:00Z",
            "exit": "2024-02-01T15:00:00Z",
            "entry_price": "150",
            "exit_price": 165.0,
            "shares": "33.333333",
            "trade_balance": "5500",
            "gain_pct": 10.0
        }"#;
        let trade: ClosedTrade = serde_json::from_str(raw).unwrap();
        assert_eq!(trade.entry_price, 150.0);
        assert_eq!(trade.trade_balance, 5500.0);
        assert_eq!(trade.gain_pct, 10.0);
    }

    #[test]
    fn test_trade_side_wire_format() {
        assert_eq!(serde_json::to_string(&TradeSide::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&TradeSide::Sell).unwrap(), "\"sell\"");
    }
}
