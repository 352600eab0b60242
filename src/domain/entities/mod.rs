pub mod position;
pub mod snapshot;
pub mod trade;
