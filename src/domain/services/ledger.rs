//! The simulated portfolio ledger: cash, open positions, realized trades.
//!
//! All operations are all-or-nothing: every precondition is checked before
//! the first field is mutated, so a returned error leaves the ledger
//! exactly as it was.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::domain::entities::position::{AssetClass, Position};
use crate::domain::entities::snapshot::{PortfolioSnapshot, DEFAULT_INITIAL_EQUITY};
use crate::domain::entities::trade::ClosedTrade;
use crate::domain::errors::LedgerError;
use crate::domain::value_objects::position_size::PositionSize;
use crate::domain::value_objects::price::Price;

/// Uppercase and trim a raw ticker symbol.
pub fn normalize_symbol(raw: &str) -> Result<String, LedgerError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::InvalidSymbol);
    }
    Ok(symbol)
}

/// The cash committed and shares received by a committed buy.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    pub position_id: String,
    pub symbol: String,
    pub shares: f64,
    pub allocation: f64,
    pub entry_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    cash_balance: f64,
    initial_equity: f64,
    // One open position per symbol; BTreeMap keeps wire output stable.
    positions: BTreeMap<String, Position>,
    closed_trades: Vec<ClosedTrade>,
}

impl Ledger {
    pub fn new(initial_equity: f64) -> Self {
        let initial_equity = if initial_equity > 0.0 {
            initial_equity
        } else {
            DEFAULT_INITIAL_EQUITY
        };
        Ledger {
            cash_balance: initial_equity,
            initial_equity,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
        }
    }

    /// Rebuild a ledger from a persisted snapshot, normalizing once at the
    /// boundary: symbols are uppercased, unusable marks fall back to the
    /// entry price, and a non-finite or negative cash balance resets to 0.
    pub fn from_snapshot(snapshot: PortfolioSnapshot) -> Self {
        let mut positions = BTreeMap::new();
        for mut position in snapshot.open_positions {
            position.symbol = position.symbol.trim().to_uppercase();
            if position.symbol.is_empty() {
                continue;
            }
            if !position.mark_price.is_finite() || position.mark_price <= 0.0 {
                position.mark_price = position.entry_price;
            }
            positions.insert(position.symbol.clone(), position);
        }
        let initial_equity = if snapshot.initial_equity > 0.0 {
            snapshot.initial_equity
        } else {
            DEFAULT_INITIAL_EQUITY
        };
        let cash_balance = if snapshot.cash_balance.is_finite() && snapshot.cash_balance >= 0.0 {
            snapshot.cash_balance
        } else {
            warn!(
                "Snapshot carries unusable cash balance {}, resetting to 0",
                snapshot.cash_balance
            );
            0.0
        };
        Ledger {
            cash_balance,
            initial_equity,
            positions,
            closed_trades: snapshot.closed_trades,
        }
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            initial_equity: self.initial_equity,
            cash_balance: self.cash_balance,
            open_positions: self.positions.values().cloned().collect(),
            closed_trades: self.closed_trades.clone(),
        }
    }

    pub fn cash_balance(&self) -> f64 {
        self.cash_balance
    }

    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Symbols of all open positions with their asset classes, for mark
    /// refresh fan-out.
    pub fn open_symbols(&self) -> Vec<(String, AssetClass)> {
        self.positions
            .values()
            .map(|p| (p.symbol.clone(), p.assetclass))
            .collect()
    }

    /// Marked value of all open positions, with entry-price fallback for
    /// positions that never received a mark.
    pub fn market_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Cash plus marked value of all open positions.
    pub fn equity(&self) -> f64 {
        self.cash_balance + self.market_value()
    }

    /// Open a position sized as a fraction of current equity.
    pub fn buy(
        &mut self,
        symbol: &str,
        size: PositionSize,
        entry_price: f64,
        mark_price: Option<f64>,
        assetclass: AssetClass,
        now: DateTime<Utc>,
    ) -> Result<BuyFill, LedgerError> {
        let allocation = self.equity() * size.fraction();
        self.buy_allocation(symbol, allocation, size, entry_price, mark_price, assetclass, now)
    }

    /// Open a position committing a fixed dollar allocation. A second buy
    /// into a held symbol merges: weighted-average entry price, summed
    /// shares.
    pub fn buy_allocation(
        &mut self,
        symbol: &str,
        allocation: f64,
        size: PositionSize,
        entry_price: f64,
        mark_price: Option<f64>,
        assetclass: AssetClass,
        now: DateTime<Utc>,
    ) -> Result<BuyFill, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let entry = Price::new(entry_price)?;
        if allocation <= 0.0 || allocation > self.cash_balance {
            return Err(LedgerError::InsufficientFunds {
                required: allocation,
                available: self.cash_balance,
            });
        }
        let mark = mark_price
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(entry.value());
        let shares = allocation / entry.value();

        self.cash_balance -= allocation;
        let position_id = match self.positions.get_mut(&symbol) {
            Some(existing) => {
                // A merge keeps the position's original asset class.
                if existing.assetclass != assetclass {
                    warn!(
                        "Merge buy of {} keeps asset class {}, ignoring {}",
                        symbol, existing.assetclass, assetclass
                    );
                }
                let total_shares = existing.shares + shares;
                existing.entry_price = (existing.shares * existing.entry_price
                    + shares * entry.value())
                    / total_shares;
                existing.shares = total_shares;
                existing.mark_price = mark;
                existing.size_label = size;
                existing.id.clone()
            }
            None => {
                let position = Position::open(
                    symbol.clone(),
                    assetclass,
                    size,
                    shares,
                    entry.value(),
                    mark,
                    now,
                );
                let id = position.id.clone();
                self.positions.insert(symbol.clone(), position);
                id
            }
        };

        Ok(BuyFill {
            position_id,
            symbol,
            shares,
            allocation,
            entry_price: entry.value(),
        })
    }

    /// Fully close the open position for `symbol` at `exit_price`.
    pub fn sell(
        &mut self,
        symbol: &str,
        exit_price: f64,
        now: DateTime<Utc>,
    ) -> Result<ClosedTrade, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let position = self
            .positions
            .get(&symbol)
            .ok_or_else(|| LedgerError::PositionNotFound(symbol.clone()))?;
        let exit = Price::new(exit_price)?;

        let proceeds = position.shares * exit.value();
        let gain_pct = if position.entry_price > 0.0 {
            (exit.value() - position.entry_price) / position.entry_price * 100.0
        } else {
            0.0
        };
        let trade = ClosedTrade {
            symbol: symbol.clone(),
            entry: position.added_at,
            exit: now,
            entry_price: position.entry_price,
            exit_price: exit.value(),
            shares: position.shares,
            trade_balance: proceeds,
            gain_pct,
        };

        self.cash_balance += proceeds;
        self.closed_trades.push(trade.clone());
        self.positions.remove(&symbol);
        Ok(trade)
    }

    /// Apply freshly observed closes to open positions. Symbols missing
    /// from the map or carrying an unusable value keep their current mark.
    /// Never touches cash or shares; idempotent for a fixed map.
    pub fn apply_marks(&mut self, marks: &HashMap<String, f64>) {
        for (symbol, position) in self.positions.iter_mut() {
            if let Some(close) = marks.get(symbol) {
                if close.is_finite() && *close > 0.0 {
                    position.update_mark(*close);
                }
            }
        }
    }

    /// Timestamp of the earliest trade ever made: the minimum of all open
    /// positions' open times and all closed trades' entries. None for a
    /// ledger that has never traded.
    pub fn earliest_trade_at(&self) -> Option<DateTime<Utc>> {
        let open = self.positions.values().map(|p| p.added_at);
        let closed = self.closed_trades.iter().map(|t| t.entry);
        open.chain(closed).min()
    }
}
