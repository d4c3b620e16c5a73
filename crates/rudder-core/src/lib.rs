//! Core domain types for the rudder trading control plane.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `OrderSide`, `OrderType`, `ClientOrderId`: Order vocabulary
//! - `Signal`: A proposed trade produced by a strategy
//! - `TradeRecord`, `TradeStatus`, `RejectReason`: The append-only trade log

pub mod decimal;
pub mod error;
pub mod order;
pub mod signal;
pub mod trade;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{ClientOrderId, OrderSide, OrderType};
pub use signal::Signal;
pub use trade::{RejectReason, RejectionKind, TradeRecord, TradeStatus};
