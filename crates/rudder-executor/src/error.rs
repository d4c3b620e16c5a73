//! Executor error types.

use thiserror::Error;

use crate::access::Capability;

/// Venue failures. Recorded against the attempt, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VenueError {
    #[error("Venue call {op} timed out after {after_ms}ms")]
    Timeout { op: &'static str, after_ms: u64 },

    #[error("Venue rejected request: {0}")]
    Rejected(String),

    #[error("Malformed venue response: {0}")]
    Malformed(String),

    #[error("Venue unavailable: {0}")]
    Unavailable(String),
}

impl VenueError {
    /// Machine-readable reason code stored on the trade record.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "venue_timeout",
            Self::Rejected(_) => "venue_rejected",
            Self::Malformed(_) => "venue_malformed",
            Self::Unavailable(_) => "venue_unavailable",
        }
    }
}

pub type VenueResult<T> = Result<T, VenueError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Forbidden: {subject} lacks {capability:?}")]
    Forbidden {
        subject: String,
        capability: Capability,
    },

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),
}

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Forbidden: {subject} lacks {capability:?}")]
    Forbidden {
        subject: String,
        capability: Capability,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

pub type ControlResult<T> = Result<T, ControlError>;
