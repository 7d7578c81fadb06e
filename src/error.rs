use thiserror::Error;

/// A trade the classifier refuses to bucket. Rejected trades never touch
/// accumulator state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidTradeError {
    #[error("invalid trade: negative timestamp {0}ms")]
    NegativeTimestamp(i64),

    #[error("invalid trade: price must be a non-negative finite number, got {0}")]
    Price(f64),

    #[error("invalid trade: quantity must be a non-negative finite number, got {0}")]
    Quantity(f64),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    InvalidTrade(#[from] InvalidTradeError),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
