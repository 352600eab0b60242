//! Wire shape of the portfolio and the buy/sell request payloads.
//!
//! Payloads arriving from the dashboard are lenient: numeric fields may be
//! JSON strings and the mark price goes by several names. Everything is
//! normalized here, once, so the ledger core never re-parses.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::entities::position::{AssetClass, Position};
use crate::domain::entities::trade::ClosedTrade;
use crate::domain::value_objects::position_size::PositionSize;

/// Cash a fresh portfolio starts with when no record exists yet.
pub const DEFAULT_INITIAL_EQUITY: f64 = 100_000.0;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            NumberOrString::Number(value) => Ok(value),
            NumberOrString::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid number: {:?}", text))),
        }
    }
}

/// Accept a JSON number or a numeric string.
pub(crate) fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?.into_f64()
}

/// Like [`de_f64`] but treats null as 0.0, for fields the wire may omit.
pub(crate) fn de_f64_or_default<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(value) => value.into_f64(),
        None => Ok(0.0),
    }
}

/// Accept a JSON number, numeric string, null, or absent field.
pub(crate) fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(value) => value.into_f64().map(Some),
        None => Ok(None),
    }
}

fn default_initial_equity() -> f64 {
    DEFAULT_INITIAL_EQUITY
}

fn default_position_size() -> PositionSize {
    PositionSize::Half
}

/// Persisted and wire shape of the whole portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    #[serde(
        default = "default_initial_equity",
        deserialize_with = "de_f64_or_default"
    )]
    pub initial_equity: f64,
    #[serde(deserialize_with = "de_f64")]
    pub cash_balance: f64,
    #[serde(default)]
    pub open_positions: Vec<Position>,
    #[serde(default)]
    pub closed_trades: Vec<ClosedTrade>,
}

/// Request to open (or add to) a simulated position.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyRequest {
    pub symbol: String,
    #[serde(default = "default_position_size")]
    pub position_size: PositionSize,
    /// Omitted entry price means "use the latest close from the oracle".
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub entry_price: Option<f64>,
    #[serde(
        default,
        alias = "current_price",
        deserialize_with = "de_opt_f64"
    )]
    pub mark_price: Option<f64>,
    #[serde(default)]
    pub assetclass: AssetClass,
}

/// Request to fully close an open position.
#[derive(Debug, Clone, Deserialize)]
pub struct SellRequest {
    pub symbol: String,
    /// Omitted exit price means an "auto" quick-sell at the latest close.
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub assetclass: AssetClass,
}

/// Target list for the admin rebalance operation.
#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceRequest {
    pub targets: Vec<String>,
}
