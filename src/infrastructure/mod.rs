pub mod http_market_data;
