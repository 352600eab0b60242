pub mod market_data;
pub mod portfolio_store;
