//! State error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    /// Malformed start-up option. Fatal at start-up.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for StateError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type StateResult<T> = Result<T, StateError>;
