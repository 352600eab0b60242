//! HTTP client for the market-data service.
//!
//! Lookups retry on transient failures (network errors, 404s from a ticker
//! the upstream has not cached yet, empty histories) with a fixed delay,
//! then give up. Other HTTP errors are terminal.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::domain::entities::position::AssetClass;
use crate::domain::repositories::market_data::{
    MarketData, MarketDataError, MarketDataResult, PricePoint,
};

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<PricePoint>,
}

pub struct HttpMarketData {
    client: Client,
    base_url: Url,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl HttpMarketData {
    pub fn new(base_url: Url, retry_attempts: u32, retry_delay: Duration) -> Self {
        HttpMarketData {
            client: Client::new(),
            base_url,
            retry_attempts: retry_attempts.max(1),
            retry_delay,
        }
    }

    fn history_url(&self, symbol: &str, assetclass: AssetClass) -> Result<Url, MarketDataError> {
        let mut url = self
            .base_url
            .join(&format!("tickers/{}/history", symbol))
            .map_err(|e| MarketDataError::LookupFailed {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("assetclass", &assetclass.to_string());
        Ok(url)
    }

    /// One fetch attempt. `Ok(None)` means "retryable, try again".
    async fn fetch_once(
        &self,
        url: &Url,
        symbol: &str,
    ) -> Result<Option<Vec<PricePoint>>, MarketDataError> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Price request for {} failed: {}", symbol, e);
                return Ok(None);
            }
        };
        // The upstream answers 404 while it is still warming a ticker.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MarketDataError::LookupFailed {
                symbol: symbol.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        let body: HistoryResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::LookupFailed {
                    symbol: symbol.to_string(),
                    reason: format!("invalid response body: {}", e),
                })?;
        if body.history.is_empty() {
            return Ok(None);
        }
        Ok(Some(body.history))
    }
}

#[async_trait]
impl MarketData for HttpMarketData {
    async fn price_history(
        &self,
        symbol: &str,
        assetclass: AssetClass,
    ) -> MarketDataResult<Vec<PricePoint>> {
        let url = self.history_url(symbol, assetclass)?;
        for attempt in 1..=self.retry_attempts {
            if let Some(history) = self.fetch_once(&url, symbol).await? {
                return Ok(history);
            }
            if attempt < self.retry_attempts {
                debug!(
                    "No history for {} yet (attempt {}/{}), retrying",
                    symbol, attempt, self.retry_attempts
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        warn!(
            "Gave up on {} after {} attempts",
            symbol, self.retry_attempts
        );
        Err(MarketDataError::NoData(symbol.to_string()))
    }
}
