//! Position and PnL ledger.
//!
//! Tracks signed positions per symbol with weighted-average cost,
//! realizes PnL on reductions and values the book in USD.

pub mod error;
pub mod portfolio;

pub use error::{PositionError, PositionResult};
pub use portfolio::{FillOutcome, Portfolio, PortfolioSnapshot, Position, PositionSnapshot};
