//! rudder paper-trading control plane.
//!
//! Wires the runtime state store, signal supervisor, execution agent and
//! operations controller around an in-process paper venue, and drives
//! them from a fixed-interval tick loop.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, PaperConfig};
pub use error::{AppError, AppResult};
