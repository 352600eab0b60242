use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::snapshot::{de_f64, de_f64_or_default};
use crate::domain::value_objects::position_size::PositionSize;

/// Asset class a ticker belongs to. Drives which market-data namespace the
/// price oracle queries for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    #[default]
    Stocks,
    Etf,
    Crypto,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Stocks => write!(f, "stocks"),
            AssetClass::Etf => write!(f, "etf"),
            AssetClass::Crypto => write!(f, "crypto"),
        }
    }
}

/// One open lot of a symbol.
///
/// Created by a successful buy, mutated only by mark-price refresh, and
/// removed when a sell fully closes it. `mark_price` is the latest
/// observed market price; when no mark has ever been observed it carries
/// the entry price so valuation never reads an undefined value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub assetclass: AssetClass,
    #[serde(default = "default_size_label")]
    pub size_label: PositionSize,
    #[serde(deserialize_with = "de_f64")]
    pub shares: f64,
    #[serde(deserialize_with = "de_f64")]
    pub entry_price: f64,
    #[serde(
        default,
        alias = "price",
        alias = "current_price",
        deserialize_with = "de_f64_or_default"
    )]
    pub mark_price: f64,
    pub added_at: DateTime<Utc>,
}

fn default_size_label() -> PositionSize {
    PositionSize::Full
}

impl Position {
    /// Open a new lot. The id is the symbol plus the open timestamp in
    /// epoch milliseconds, unique per open position.
    pub fn open(
        symbol: String,
        assetclass: AssetClass,
        size_label: PositionSize,
        shares: f64,
        entry_price: f64,
        mark_price: f64,
        added_at: DateTime<Utc>,
    ) -> Self {
        let id = format!("{}-{}", symbol, added_at.timestamp_millis());
        Position {
            id,
            symbol,
            assetclass,
            size_label,
            shares,
            entry_price,
            mark_price,
            added_at,
        }
    }

    /// The price used to value this position: the latest mark when one is
    /// usable, otherwise the entry price.
    pub fn mark_or_entry(&self) -> f64 {
        if self.mark_price.is_finite() && self.mark_price > 0.0 {
            self.mark_price
        } else {
            self.entry_price
        }
    }

    pub fn update_mark(&mut self, mark_price: f64) {
        self.mark_price = mark_price;
    }

    pub fn market_value(&self) -> f64 {
        self.shares * self.mark_or_entry()
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares * self.entry_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mark: f64) -> Position {
        Position::open(
            "AAPL".to_string(),
            AssetClass::Stocks,
            PositionSize::Half,
            10.0,
            150.0,
            mark,
            Utc::now(),
        )
    }

    #[test]
    fn test_open_assigns_symbol_timestamp_id() {
        let added = Utc::now();
        let position = Position::open(
            "TSLA".to_string(),
            AssetClass::Stocks,
            PositionSize::Full,
            1.0,
            200.0,
            200.0,
            added,
        );
        assert_eq!(
            position.id,
            format!("TSLA-{}", added.timestamp_millis())
        );
    }

    #[test]
    fn test_mark_or_entry_uses_mark_when_present() {
        assert_eq!(sample(160.0).mark_or_entry(), 160.0);
    }

    #[test]
    fn test_mark_or_entry_falls_back_to_entry() {
        assert_eq!(sample(0.0).mark_or_entry(), 150.0);
        assert_eq!(sample(f64::NAN).mark_or_entry(), 150.0);
    }

    #[test]
    fn test_market_value_and_cost_basis() {
        let position = sample(160.0);
        assert_eq!(position.market_value(), 1600.0);
        assert_eq!(position.cost_basis(), 1500.0);
    }

    #[test]
    fn test_deserialize_accepts_price_alias_and_string_numbers() {
        let raw = r#"{
            "id": "NVDA-1700000000000",
            "symbol": "NVDA",
            "size_label": "1/4",
            "shares": "2.5",
            "entry_price": "480",
            "price": 495.25,
            "added_at": "2024-01-05T14:30:00Z"
        }"#;
        let position: Position = serde_json::from_str(raw).unwrap();
        assert_eq!(position.assetclass, AssetClass::Stocks);
        assert_eq!(position.size_label, PositionSize::Quarter);
        assert_eq!(position.shares, 2.5);
        assert_eq!(position.entry_price, 480.0);
        assert_eq!(position.mark_price, 495.25);
    }
}
