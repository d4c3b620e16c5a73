//! Prometheus metrics and structured logging for rudder.
//!
//! - Prometheus counters for orders, rejections, state changes and signals
//! - Venue call latency histogram
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
