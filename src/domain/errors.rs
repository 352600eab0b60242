use thiserror::Error;

/// Validation and precondition failures raised by ledger operations.
///
/// Every variant is checked before any state is mutated, so a returned
/// error always means the ledger is unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Symbol is required")]
    InvalidSymbol,

    #[error("Price must be a finite positive number, got {0}")]
    InvalidPrice(f64),

    #[error("Not enough cash to fund the allocation: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("No open position for {0}")]
    PositionNotFound(String),
}

/// Benchmark comparison failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BenchmarkError {
    #[error("Benchmark unavailable: {0}")]
    Unavailable(String),
}
