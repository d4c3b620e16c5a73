//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State error: {0}")]
    State(#[from] rudder_state::StateError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] rudder_strategy::StrategyError),

    #[error("Execution error: {0}")]
    Agent(#[from] rudder_executor::AgentError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] rudder_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
