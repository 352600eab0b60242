use url::Url;

/// Runtime configuration for the portfolio service.
#[derive(Debug, Clone)]
pub struct PortfolioConfig {
    pub portfolio_id: String,
    pub initial_equity: f64,
    pub benchmark_symbol: String,
    pub database_url: String,
    pub market_data_base_url: Url,
    pub price_retry_attempts: u32,
    pub price_retry_delay_ms: u64,
    pub mark_refresh_interval_secs: u64,
    pub port: u16,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            portfolio_id: "default".to_string(),
            initial_equity: 100_000.0,
            benchmark_symbol: "SPY".to_string(),
            database_url: "sqlite://data/paperfolio.db".to_string(),
            market_data_base_url: Url::parse("http://localhost:8000/")
                .expect("default base url is valid"),
            price_retry_attempts: 6,
            price_retry_delay_ms: 1200,
            mark_refresh_interval_secs: 300,
            port: 3000,
        }
    }
}

impl PortfolioConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults on anything missing or unparseable.
    pub fn from_env() -> PortfolioConfig {
        let mut config = PortfolioConfig::default();

        if let Ok(id) = std::env::var("PORTFOLIO_ID") {
            if !id.trim().is_empty() {
                config.portfolio_id = id.trim().to_string();
            }
        }

        if let Ok(equity) = std::env::var("INITIAL_EQUITY") {
            match equity.parse::<f64>() {
                Ok(value) if value > 0.0 => config.initial_equity = value,
                Ok(value) => {
                    tracing::warn!(
                        "Invalid INITIAL_EQUITY value: {} (must be positive), using default: {}",
                        value,
                        config.initial_equity
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse INITIAL_EQUITY '{}': {}, using default: {}",
                        equity,
                        e,
                        config.initial_equity
                    );
                }
            }
        }

        if let Ok(symbol) = std::env::var("BENCHMARK_SYMBOL") {
            let symbol = symbol.trim().to_uppercase();
            if !symbol.is_empty() {
                config.benchmark_symbol = symbol;
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(base) = std::env::var("MARKET_DATA_BASE_URL") {
            match Url::parse(&base) {
                Ok(url) => config.market_data_base_url = url,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse MARKET_DATA_BASE_URL '{}': {}, using default: {}",
                        base,
                        e,
                        config.market_data_base_url
                    );
                }
            }
        }

        if let Ok(attempts) = std::env::var("PRICE_RETRY_ATTEMPTS") {
            if let Ok(value) = attempts.parse::<u32>() {
                if value >= 1 && value <= 20 {
                    config.price_retry_attempts = value;
                }
            }
        }

        if let Ok(delay) = std::env::var("PRICE_RETRY_DELAY_MS") {
            if let Ok(value) = delay.parse::<u64>() {
                if value <= 60_000 {
                    config.price_retry_delay_ms = value;
                }
            }
        }

        if let Ok(interval) = std::env::var("MARK_REFRESH_INTERVAL_SECS") {
            if let Ok(value) = interval.parse::<u64>() {
                if value >= 10 && value <= 86_400 {
                    config.mark_refresh_interval_secs = value;
                }
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(value) = port.parse::<u16>() {
                config.port = value;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PortfolioConfig::default();
        assert_eq!(config.portfolio_id, "default");
        assert_eq!(config.initial_equity, 100_000.0);
        assert_eq!(config.benchmark_symbol, "SPY");
        assert_eq!(config.price_retry_attempts, 6);
        assert_eq!(config.price_retry_delay_ms, 1200);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_default_base_url_parses() {
        let config = PortfolioConfig::default();
        assert_eq!(config.market_data_base_url.scheme(), "http");
    }
}
