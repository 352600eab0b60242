//! End-to-end tests over the full stack: portfolio service, HTTP
//! market-data client against a mock server, and the SQLite store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use paperfolio::application::services::portfolio_service::{PortfolioError, PortfolioService};
use paperfolio::domain::entities::snapshot::{BuyRequest, SellRequest};
use paperfolio::domain::value_objects::position_size::PositionSize;
use paperfolio::infrastructure::http_market_data::HttpMarketData;
use paperfolio::persistence::repository::SqlitePortfolioStore;
use paperfolio::persistence::{init_database, DbPool};

async fn memory_pool() -> DbPool {
    init_database("sqlite::memory:").await.unwrap()
}

fn market_data(server: &MockServer) -> Arc<HttpMarketData> {
    let base = Url::parse(&server.uri()).unwrap().join("/").unwrap();
    Arc::new(HttpMarketData::new(base, 2, Duration::ZERO))
}

async fn mount_history(server: &MockServer, symbol: &str, closes: &[(&str, f64)]) {
    let history: Vec<_> = closes
        .iter()
        .map(|(date, close)| json!({"date": date, "close": close}))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/tickers/{}/history", symbol)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "history": history })))
        .mount(server)
        .await;
}

async fn open_service(server: &MockServer, pool: DbPool) -> Arc<PortfolioService> {
    let store = Arc::new(SqlitePortfolioStore::new(pool));
    Arc::new(
        PortfolioService::open("default", 100_000.0, "SPY", market_data(server), store)
            .await
            .unwrap(),
    )
}

fn buy_request(symbol: &str, size: PositionSize, entry_price: Option<f64>) -> BuyRequest {
    serde_json::from_value(json!({
        "symbol": symbol,
        "position_size": size.label(),
        "entry_price": entry_price,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_full_trade_cycle() {
    let server = MockServer::start().await;
    let service = open_service(&server, memory_pool().await).await;

    // Half-size buy commits 5% of the 100_000 equity.
    let snapshot = service
        .buy(buy_request("AAPL", PositionSize::Half, Some(150.0)))
        .await
        .unwrap();
    assert_eq!(snapshot.cash_balance, 95_000.0);
    assert_eq!(snapshot.open_positions.len(), 1);
    let position = &snapshot.open_positions[0];
    assert_eq!(position.symbol, "AAPL");
    assert!((position.shares - 5_000.0 / 150.0).abs() < 1e-9);

    let snapshot = service
        .sell(SellRequest {
            symbol: "aapl".to_string(),
            exit_price: Some(165.0),
            assetclass: Default::default(),
        })
        .await
        .unwrap();
    assert!((snapshot.cash_balance - 100_500.0).abs() < 1e-6);
    assert!(snapshot.open_positions.is_empty());
    assert_eq!(snapshot.closed_trades.len(), 1);
    assert!((snapshot.closed_trades[0].gain_pct - 10.0).abs() < 1e-9);

    let stats = service.stats().await;
    assert!((stats.equity - 100_500.0).abs() < 1e-6);
    assert!((stats.total_pct - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_buy_resolves_price_from_market_data() {
    let server = MockServer::start().await;
    mount_history(&server, "MSFT", &[("2024-01-02", 395.0), ("2024-01-03", 400.0)]).await;
    let service = open_service(&server, memory_pool().await).await;

    let snapshot = service
        .buy(buy_request("MSFT", PositionSize::Quarter, None))
        .await
        .unwrap();
    let position = &snapshot.open_positions[0];
    assert_eq!(position.entry_price, 400.0);
    assert!((position.shares - 2_500.0 / 400.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_rejected_trade_leaves_portfolio_unchanged() {
    let server = MockServer::start().await;
    let service = open_service(&server, memory_pool().await).await;

    let result = service
        .buy(buy_request("AAPL", PositionSize::Half, Some(-5.0)))
        .await;
    assert!(matches!(
        result,
        Err(PortfolioError::Ledger(_))
    ));
    assert_eq!(result.unwrap_err().code(), "invalid_price");

    let result = service
        .sell(SellRequest {
            symbol: "TSLA".to_string(),
            exit_price: Some(100.0),
            assetclass: Default::default(),
        })
        .await;
    assert_eq!(result.unwrap_err().code(), "not_found");

    let stats = service.stats().await;
    assert_eq!(stats.equity, 100_000.0);
    assert_eq!(stats.invested, 0.0);
}

#[tokio::test]
async fn test_portfolio_survives_restart() {
    let server = MockServer::start().await;
    let pool = memory_pool().await;

    {
        let service = open_service(&server, pool.clone()).await;
        service
            .buy(buy_request("AAPL", PositionSize::Half, Some(150.0)))
            .await
            .unwrap();
    }

    // A second service over the same store resumes the saved state.
    let service = open_service(&server, pool).await;
    let stats = service.stats().await;
    assert_eq!(stats.invested, 5_000.0);
    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.cash_balance, 95_000.0);
    assert_eq!(snapshot.open_positions[0].symbol, "AAPL");
}

#[tokio::test]
async fn test_snapshot_refreshes_marks_from_market_data() {
    let server = MockServer::start().await;
    mount_history(&server, "AAPL", &[("2024-01-02", 150.0), ("2024-01-03", 158.0)]).await;
    let service = open_service(&server, memory_pool().await).await;

    service
        .buy(buy_request("AAPL", PositionSize::Half, Some(150.0)))
        .await
        .unwrap();

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.open_positions[0].mark_price, 158.0);

    let stats = service.stats().await;
    let shares = 5_000.0 / 150.0;
    assert!((stats.market_value - shares * 158.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_benchmark_compares_since_first_trade() {
    let server = MockServer::start().await;
    mount_history(&server, "SPY", &[("2024-01-02", 400.0), ("2024-01-03", 420.0)]).await;
    let service = open_service(&server, memory_pool().await).await;

    service
        .buy(buy_request("AAPL", PositionSize::Half, Some(150.0)))
        .await
        .unwrap();

    // The trade anchor postdates the fixture series, so the full window
    // is used.
    let report = service.benchmark().await.unwrap();
    assert_eq!(report.symbol, "SPY");
    assert!((report.return_pct - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_benchmark_without_market_data_is_unavailable() {
    let server = MockServer::start().await;
    let service = open_service(&server, memory_pool().await).await;

    let result = service.benchmark().await;
    assert_eq!(result.unwrap_err().code(), "benchmark_unavailable");
}

#[tokio::test]
async fn test_rebalance_moves_portfolio_to_targets() {
    let server = MockServer::start().await;
    mount_history(&server, "OLD", &[("2024-01-02", 50.0), ("2024-01-03", 60.0)]).await;
    mount_history(&server, "NEW1", &[("2024-01-03", 10.0)]).await;
    mount_history(&server, "NEW2", &[("2024-01-03", 25.0)]).await;
    let service = open_service(&server, memory_pool().await).await;

    service
        .buy(buy_request("OLD", PositionSize::Full, Some(50.0)))
        .await
        .unwrap();

    let snapshot = service
        .rebalance(vec!["NEW1".to_string(), "NEW2".to_string()])
        .await
        .unwrap();

    let symbols: Vec<&str> = snapshot
        .open_positions
        .iter()
        .map(|p| p.symbol.as_str())
        .collect();
    assert_eq!(symbols, vec!["NEW1", "NEW2"]);
    assert_eq!(snapshot.closed_trades.len(), 1);
    assert_eq!(snapshot.closed_trades[0].exit_price, 60.0);
    assert!(snapshot.cash_balance.abs() < 1e-6);
}

#[tokio::test]
async fn test_merge_buy_logs_both_trades() {
    let server = MockServer::start().await;
    let pool = memory_pool().await;
    let service = open_service(&server, pool.clone()).await;

    // Both buys merge into one AAPL position and share its id; the audit
    // log must still record each event.
    service
        .buy(buy_request("AAPL", PositionSize::Half, Some(100.0)))
        .await
        .unwrap();
    service
        .buy(buy_request("AAPL", PositionSize::Half, Some(200.0)))
        .await
        .unwrap();

    let snapshot = service.snapshot().await.unwrap();
    assert_eq!(snapshot.open_positions.len(), 1);

    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT position_id, side FROM trade_log ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, rows[1].0);
    assert!(rows.iter().all(|(_, side)| side == "buy"));
}

#[tokio::test]
async fn test_wire_payloads_accept_string_numbers() {
    let server = MockServer::start().await;
    let service = open_service(&server, memory_pool().await).await;

    let request: BuyRequest = serde_json::from_value(json!({
        "symbol": "  aapl ",
        "position_size": "1/4",
        "entry_price": "150.5",
        "current_price": "151"
    }))
    .unwrap();
    assert_eq!(request.position_size, PositionSize::Quarter);
    assert_eq!(request.mark_price, Some(151.0));

    let snapshot = service.buy(request).await.unwrap();
    let position = &snapshot.open_positions[0];
    assert_eq!(position.symbol, "AAPL");
    assert_eq!(position.entry_price, 150.5);
    assert_eq!(position.mark_price, 151.0);
}
