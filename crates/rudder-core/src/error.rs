//! Error types for rudder-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid leverage: {0}")]
    InvalidLeverage(String),

    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Invalid order side: {0:?}")]
    InvalidSide(String),

    #[error("Invalid order type: {0:?}")]
    InvalidOrderType(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
