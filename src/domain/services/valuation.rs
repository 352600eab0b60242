//! Point-in-time portfolio valuation.
//!
//! Always recomputed from ledger state, never cached, so equity and the
//! performance percentage cannot drift from stale marks.

use serde::Serialize;

use crate::domain::services::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioStats {
    /// Marked value of all open positions (entry fallback for missing marks).
    pub market_value: f64,
    /// Cost basis still deployed in open positions.
    pub invested: f64,
    /// Cash plus market value.
    pub equity: f64,
    /// Total return against the initial equity baseline.
    pub total_pct: f64,
}

impl PortfolioStats {
    pub fn compute(ledger: &Ledger) -> Self {
        let market_value = ledger.market_value();
        let invested = ledger.positions().map(|p| p.cost_basis()).sum();
        let equity = ledger.cash_balance() + market_value;
        let total_pct = if ledger.initial_equity() > 0.0 {
            (equity - ledger.initial_equity()) / ledger.initial_equity() * 100.0
        } else {
            0.0
        };
        PortfolioStats {
            market_value,
            invested,
            equity,
            total_pct,
        }
    }
}
