//! Signal execution for the rudder control plane.
//!
//! # Key Components
//!
//! - [`ExecutionAgent`]: gates, sizes, risk-checks and submits signals
//! - [`OpsController`]: permission-checked, audited state changes
//! - [`Venue`]: exchange port, with [`PaperVenue`] as the in-process venue
//! - [`AuditSink`]: audit trail for every decision and command
//! - [`TradeJournal`]: append-only record of execution attempts
//!
//! # Pipeline (in `ExecutionAgent::execute_signal`)
//!
//! 1. Mode gate -> REJECTED trading_disabled
//! 2. Price fetch (venue, bounded) -> PENDING venue_*
//! 3. Strategy budget -> REJECTED budget_exceeded
//! 4. Risk limits -> REJECTED leverage_limit / insufficient_equity / exposure_limit
//! 5. set_leverage (if > 1) + place_order (bounded) -> PENDING venue_*
//! 6. Fill -> Portfolio + FILLED; accepted without fill -> PENDING

pub mod access;
pub mod agent;
pub mod audit;
pub mod control;
pub mod error;
pub mod journal;
pub mod paper;
pub mod venue;

pub use access::{Capability, Grants, Role};
pub use agent::{
    AgentConfig, AgentMode, CapitalSnapshot, ExecutionAgent, ExecutionSummary, SignalError,
};
pub use audit::{AuditEvent, AuditOutcome, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use control::OpsController;
pub use error::{AgentError, AgentResult, ControlError, ControlResult, VenueError, VenueResult};
pub use journal::TradeJournal;
pub use paper::{PaperVenue, VenueCall, VenueOp};
pub use venue::{AckStatus, Balance, DynVenue, OrderAck, Venue, VenuePriceSource};
