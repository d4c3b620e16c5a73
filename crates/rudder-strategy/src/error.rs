//! Strategy error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StrategyResult<T> = Result<T, StrategyError>;
