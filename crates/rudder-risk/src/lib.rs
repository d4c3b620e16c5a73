//! Capital allocation and risk validation.
//!
//! Both components are pure: they read configuration passed in by value
//! and never touch shared state.
//!
//! - CapitalAllocator: equity, cap and reserves → per-strategy budgets
//! - RiskManager: order economics → pass or a typed rejection

pub mod allocator;
pub mod error;
pub mod manager;

pub use allocator::{AllocatorConfig, CapitalAllocation, CapitalAllocator};
pub use error::{RiskError, RiskResult};
pub use manager::{RiskLimits, RiskManager, RiskVerdict};
