//! Position error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Invalid fill for {symbol}: {reason}")]
    InvalidFill { symbol: String, reason: String },
}

pub type PositionResult<T> = Result<T, PositionError>;
