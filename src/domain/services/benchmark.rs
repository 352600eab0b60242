//! Benchmark comparison: the reference instrument's percentage return over
//! the portfolio's trading window.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::errors::BenchmarkError;
use crate::domain::repositories::market_data::PricePoint;

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub symbol: String,
    /// Anchor of the comparison window; None when the ledger never traded
    /// and the full series was used.
    pub since: Option<DateTime<Utc>>,
    pub return_pct: f64,
}

/// Percentage return of `history` from the first to the last priced point
/// at or after `anchor`. When the anchor filter empties the window the
/// full series is used instead.
pub fn window_return(
    history: &[PricePoint],
    anchor: Option<DateTime<Utc>>,
) -> Result<f64, BenchmarkError> {
    let anchored: Vec<&PricePoint> = match anchor {
        Some(at) => {
            let anchor_date = at.date_naive();
            let filtered: Vec<&PricePoint> =
                history.iter().filter(|p| p.date >= anchor_date).collect();
            if filtered.is_empty() {
                history.iter().collect()
            } else {
                filtered
            }
        }
        None => history.iter().collect(),
    };

    let closes: Vec<f64> = anchored
        .iter()
        .map(|p| p.close)
        .filter(|c| c.is_finite())
        .collect();
    if closes.len() < 2 {
        return Err(BenchmarkError::Unavailable(
            "fewer than two priced points in the window".to_string(),
        ));
    }
    let first = closes[0];
    let last = closes[closes.len() - 1];
    if first == 0.0 || last == 0.0 {
        return Err(BenchmarkError::Unavailable(
            "window has a zero close".to_string(),
        ));
    }
    Ok((last - first) / first * 100.0)
}
