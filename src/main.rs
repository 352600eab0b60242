use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paperfolio::application::services::portfolio_service::{PortfolioError, PortfolioService};
use paperfolio::config::PortfolioConfig;
use paperfolio::domain::entities::snapshot::{BuyRequest, RebalanceRequest, SellRequest};
use paperfolio::domain::services::benchmark::BenchmarkReport;
use paperfolio::domain::services::valuation::PortfolioStats;
use paperfolio::infrastructure::http_market_data::HttpMarketData;
use paperfolio::persistence::repository::SqlitePortfolioStore;

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperfolio=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PortfolioConfig::from_env();
    info!(
        "Starting portfolio '{}' (benchmark {})",
        config.portfolio_id, config.benchmark_symbol
    );

    let pool = paperfolio::persistence::init_database(&config.database_url).await?;
    let store = Arc::new(SqlitePortfolioStore::new(pool));
    let market_data = Arc::new(HttpMarketData::new(
        config.market_data_base_url.clone(),
        config.price_retry_attempts,
        Duration::from_millis(config.price_retry_delay_ms),
    ));

    let service = Arc::new(
        PortfolioService::open(
            &config.portfolio_id,
            config.initial_equity,
            &config.benchmark_symbol,
            market_data,
            store,
        )
        .await?,
    );

    // Periodic mark refresh keeps open positions priced between requests
    let refresh_service = Arc::clone(&service);
    let refresh_interval = Duration::from_secs(config.mark_refresh_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        interval.tick().await; // first tick fires immediately, skip it
        loop {
            interval.tick().await;
            refresh_service.refresh_marks().await;
        }
    });

    let app = Router::new()
        .route("/", get(|| async { "Paperfolio portfolio service is running!" }))
        .route("/health", get(health_check))
        .route("/portfolio", get(get_portfolio))
        .route("/portfolio/stats", get(get_stats))
        .route("/portfolio/benchmark", get(get_benchmark))
        .route("/portfolio/buy", post(buy))
        .route("/portfolio/sell", post(sell))
        .route("/admin/rebalance", post(rebalance))
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Shutdown complete");
    Ok(())
}

fn error_response(error: PortfolioError) -> ApiError {
    let code = error.code();
    let status = match code {
        "not_found" => StatusCode::NOT_FOUND,
        "benchmark_unavailable" => StatusCode::BAD_GATEWAY,
        "storage_error" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(json!({ "error": code, "message": error.to_string() })),
    )
}

async fn health_check(State(service): State<Arc<PortfolioService>>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "portfolio_id": service.portfolio_id(),
    }))
}

async fn get_portfolio(
    State(service): State<Arc<PortfolioService>>,
) -> ApiResult<paperfolio::domain::entities::snapshot::PortfolioSnapshot> {
    service.snapshot().await.map(Json).map_err(error_response)
}

async fn get_stats(State(service): State<Arc<PortfolioService>>) -> Json<PortfolioStats> {
    Json(service.stats().await)
}

async fn get_benchmark(
    State(service): State<Arc<PortfolioService>>,
) -> ApiResult<BenchmarkReport> {
    service.benchmark().await.map(Json).map_err(error_response)
}

async fn buy(
    State(service): State<Arc<PortfolioService>>,
    Json(request): Json<BuyRequest>,
) -> ApiResult<paperfolio::domain::entities::snapshot::PortfolioSnapshot> {
    service.buy(request).await.map(Json).map_err(error_response)
}

async fn sell(
    State(service): State<Arc<PortfolioService>>,
    Json(request): Json<SellRequest>,
) -> ApiResult<paperfolio::domain::entities::snapshot::PortfolioSnapshot> {
    service.sell(request).await.map(Json).map_err(error_response)
}

async fn rebalance(
    State(service): State<Arc<PortfolioService>>,
    Json(request): Json<RebalanceRequest>,
) -> ApiResult<paperfolio::domain::entities::snapshot::PortfolioSnapshot> {
    service
        .rebalance(request.targets)
        .await
        .map(Json)
        .map_err(error_response)
}
