//! Portfolio orchestration: serializes trades, fans out price lookups,
//! and keeps the in-memory ledger and the stored snapshot in agreement.

use chrono::Utc;
use futures_util::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::entities::position::AssetClass;
use crate::domain::entities::snapshot::{BuyRequest, PortfolioSnapshot, SellRequest};
use crate::domain::entities::trade::{TradeLogEntry, TradeSide};
use crate::domain::errors::{BenchmarkError, LedgerError};
use crate::domain::repositories::market_data::MarketData;
use crate::domain::repositories::portfolio_store::{PortfolioStore, StoreError};
use crate::domain::services::benchmark::{window_return, BenchmarkReport};
use crate::domain::services::ledger::{normalize_symbol, Ledger};
use crate::domain::services::valuation::PortfolioStats;
use crate::domain::value_objects::position_size::PositionSize;

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),

    #[error("No price available for {0}")]
    PriceUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PortfolioError {
    /// Stable machine-readable code carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            PortfolioError::Ledger(LedgerError::InvalidSymbol) => "invalid_symbol",
            PortfolioError::Ledger(LedgerError::InvalidPrice(_)) => "invalid_price",
            PortfolioError::Ledger(LedgerError::InsufficientFunds { .. }) => "insufficient_cash",
            PortfolioError::Ledger(LedgerError::PositionNotFound(_)) => "not_found",
            PortfolioError::Benchmark(_) => "benchmark_unavailable",
            PortfolioError::PriceUnavailable(_) => "invalid_price",
            PortfolioError::Store(_) => "storage_error",
        }
    }
}

/// Owns one portfolio. Buy, sell, and rebalance are serialized through a
/// single mutex (both read and rewrite cash and positions); mark refresh
/// fetches prices outside the lock and loses races harmlessly.
pub struct PortfolioService {
    ledger: Mutex<Ledger>,
    market_data: Arc<dyn MarketData>,
    store: Arc<dyn PortfolioStore>,
    portfolio_id: String,
    benchmark_symbol: String,
}

impl PortfolioService {
    /// Load the portfolio from the store, creating and persisting a fresh
    /// all-cash ledger when no record exists.
    pub async fn open(
        portfolio_id: &str,
        initial_equity: f64,
        benchmark_symbol: &str,
        market_data: Arc<dyn MarketData>,
        store: Arc<dyn PortfolioStore>,
    ) -> Result<Self, PortfolioError> {
        let ledger = match store.load(portfolio_id).await? {
            Some(snapshot) => Ledger::from_snapshot(snapshot),
            None => {
                let ledger = Ledger::new(initial_equity);
                store.save(portfolio_id, &ledger.snapshot()).await?;
                info!(
                    "Created portfolio '{}' with {:.2} starting cash",
                    portfolio_id,
                    ledger.cash_balance()
                );
                ledger
            }
        };
        Ok(PortfolioService {
            ledger: Mutex::new(ledger),
            market_data,
            store: Arc::clone(&store),
            portfolio_id: portfolio_id.to_string(),
            benchmark_symbol: benchmark_symbol.to_string(),
        })
    }

    pub fn portfolio_id(&self) -> &str {
        &self.portfolio_id
    }

    /// Refresh marks best-effort, persist, and return the current snapshot.
    pub async fn snapshot(&self) -> Result<PortfolioSnapshot, PortfolioError> {
        let symbols = { self.ledger.lock().await.open_symbols() };
        let marks = self.fetch_marks(symbols).await;

        let mut ledger = self.ledger.lock().await;
        ledger.apply_marks(&marks);
        let snapshot = ledger.snapshot();
        self.store.save(&self.portfolio_id, &snapshot).await?;
        Ok(snapshot)
    }

    /// Refresh marks without persisting; used by the background task.
    pub async fn refresh_marks(&self) {
        let symbols = { self.ledger.lock().await.open_symbols() };
        if symbols.is_empty() {
            return;
        }
        let count = symbols.len();
        let marks = self.fetch_marks(symbols).await;
        debug!("Refreshed {}/{} marks", marks.len(), count);
        self.ledger.lock().await.apply_marks(&marks);
    }

    pub async fn buy(&self, request: BuyRequest) -> Result<PortfolioSnapshot, PortfolioError> {
        let symbol = normalize_symbol(&request.symbol)?;
        let entry_price = match request.entry_price {
            Some(price) => price,
            None => self.resolve_latest_close(&symbol, request.assetclass).await?,
        };

        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;
        let mut next = ledger.clone();
        let fill = next.buy(
            &symbol,
            request.position_size,
            entry_price,
            request.mark_price,
            request.assetclass,
            now,
        )?;
        let snapshot = next.snapshot();
        self.store.save(&self.portfolio_id, &snapshot).await?;
        *ledger = next;

        info!(
            "Bought {:.4} {} at {:.2} ({})",
            fill.shares, fill.symbol, fill.entry_price, request.position_size
        );
        self.log_trade(TradeLogEntry {
            position_id: fill.position_id,
            symbol: fill.symbol,
            side: TradeSide::Buy,
            shares: fill.shares,
            price: fill.entry_price,
            timestamp: now,
            position_size: Some(request.position_size.label().to_string()),
        })
        .await;
        Ok(snapshot)
    }

    pub async fn sell(&self, request: SellRequest) -> Result<PortfolioSnapshot, PortfolioError> {
        let symbol = normalize_symbol(&request.symbol)?;
        let exit_price = match request.exit_price {
            Some(price) => price,
            None => self.resolve_latest_close(&symbol, request.assetclass).await?,
        };

        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;
        let mut next = ledger.clone();
        let position_id = next
            .position(&symbol)
            .map(|p| p.id.clone())
            .unwrap_or_default();
        let trade = next.sell(&symbol, exit_price, now)?;
        let snapshot = next.snapshot();
        self.store.save(&self.portfolio_id, &snapshot).await?;
        *ledger = next;

        info!(
            "Sold {:.4} {} at {:.2} ({:+.2}%)",
            trade.shares, trade.symbol, trade.exit_price, trade.gain_pct
        );
        self.log_trade(TradeLogEntry {
            position_id,
            symbol: trade.symbol.clone(),
            side: TradeSide::Sell,
            shares: trade.shares,
            price: trade.exit_price,
            timestamp: now,
            position_size: None,
        })
        .await;
        Ok(snapshot)
    }

    pub async fn stats(&self) -> PortfolioStats {
        PortfolioStats::compute(&*self.ledger.lock().await)
    }

    /// Benchmark return over the portfolio's trading window.
    pub async fn benchmark(&self) -> Result<BenchmarkReport, PortfolioError> {
        let anchor = { self.ledger.lock().await.earliest_trade_at() };
        let history = self
            .market_data
            .price_history(&self.benchmark_symbol, AssetClass::Etf)
            .await
            .map_err(|e| BenchmarkError::Unavailable(e.to_string()))?;
        let return_pct = window_return(&history, anchor)?;
        Ok(BenchmarkReport {
            symbol: self.benchmark_symbol.clone(),
            since: anchor,
            return_pct,
        })
    }

    /// Align open positions with a target symbol list: close everything
    /// not in the list at its latest close (mark/entry fallback when the
    /// oracle fails), then spread remaining cash equally across missing
    /// targets. Targets without a usable price are skipped.
    pub async fn rebalance(
        &self,
        targets: Vec<String>,
    ) -> Result<PortfolioSnapshot, PortfolioError> {
        let target_set: BTreeSet<String> = targets
            .iter()
            .filter_map(|raw| normalize_symbol(raw).ok())
            .collect();

        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;
        let mut next = ledger.clone();
        let mut log_entries = Vec::new();

        let to_sell: Vec<(String, String, AssetClass, f64)> = next
            .positions()
            .filter(|p| !target_set.contains(&p.symbol))
            .map(|p| (p.symbol.clone(), p.id.clone(), p.assetclass, p.mark_or_entry()))
            .collect();
        for (symbol, position_id, assetclass, fallback) in to_sell {
            let exit_price = match self.market_data.latest_close(&symbol, assetclass).await {
                Ok(close) => close,
                Err(e) => {
                    debug!("Rebalance sell of {} uses stale mark: {}", symbol, e);
                    fallback
                }
            };
            let trade = next.sell(&symbol, exit_price, now)?;
            log_entries.push(TradeLogEntry {
                position_id,
                symbol: trade.symbol.clone(),
                side: TradeSide::Sell,
                shares: trade.shares,
                price: trade.exit_price,
                timestamp: now,
                position_size: None,
            });
        }

        let owned: BTreeSet<String> =
            next.positions().map(|p| p.symbol.clone()).collect();
        let to_buy: Vec<&String> =
            target_set.iter().filter(|s| !owned.contains(*s)).collect();
        if !to_buy.is_empty() {
            let per_allocation = next.cash_balance() / to_buy.len() as f64;
            for symbol in to_buy {
                let entry_price =
                    match self.market_data.latest_close(symbol, AssetClass::Stocks).await {
                        Ok(close) => close,
                        Err(e) => {
                            warn!("Rebalance skips {}: {}", symbol, e);
                            continue;
                        }
                    };
                let allocation = per_allocation.min(next.cash_balance());
                if allocation <= 0.0 {
                    continue;
                }
                match next.buy_allocation(
                    symbol,
                    allocation,
                    PositionSize::Auto,
                    entry_price,
                    None,
                    AssetClass::Stocks,
                    now,
                ) {
                    Ok(fill) => log_entries.push(TradeLogEntry {
                        position_id: fill.position_id,
                        symbol: fill.symbol,
                        side: TradeSide::Buy,
                        shares: fill.shares,
                        price: fill.entry_price,
                        timestamp: now,
                        position_size: Some(PositionSize::Auto.label().to_string()),
                    }),
                    Err(e) => warn!("Rebalance skips {}: {}", symbol, e),
                }
            }
        }

        let snapshot = next.snapshot();
        self.store.save(&self.portfolio_id, &snapshot).await?;
        *ledger = next;
        drop(ledger);

        info!(
            "Rebalanced portfolio '{}': {} trades",
            self.portfolio_id,
            log_entries.len()
        );
        for entry in log_entries {
            self.log_trade(entry).await;
        }
        Ok(snapshot)
    }

    /// Fan out latest-close lookups across symbols. Each failure is
    /// isolated: the symbol simply keeps its stale mark.
    async fn fetch_marks(&self, symbols: Vec<(String, AssetClass)>) -> HashMap<String, f64> {
        let lookups = symbols.into_iter().map(|(symbol, assetclass)| {
            let market_data = Arc::clone(&self.market_data);
            async move {
                match market_data.latest_close(&symbol, assetclass).await {
                    Ok(close) => Some((symbol, close)),
                    Err(e) => {
                        debug!("Mark refresh skipped for {}: {}", symbol, e);
                        None
                    }
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn resolve_latest_close(
        &self,
        symbol: &str,
        assetclass: AssetClass,
    ) -> Result<f64, PortfolioError> {
        self.market_data
            .latest_close(symbol, assetclass)
            .await
            .map_err(|e| {
                warn!("Could not resolve a price for {}: {}", symbol, e);
                PortfolioError::PriceUnavailable(symbol.to_string())
            })
    }

    /// Trade-log writes are audit-only and must never fail a committed
    /// trade.
    async fn log_trade(&self, entry: TradeLogEntry) {
        if let Err(e) = self.store.append_trade_log(&entry).await {
            warn!(
                "Failed to append trade log entry for {}: {}",
                entry.position_id, e
            );
        }
    }
}
