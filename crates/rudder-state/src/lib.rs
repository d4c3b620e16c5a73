//! Runtime operating state for the rudder control plane.
//!
//! Holds the single authoritative copy of the operating configuration
//! (mode flags, capital policy, strategy weights, reserves) and the
//! start-up options it is seeded from.
//!
//! Readers take cheap `Arc` snapshots; writers apply partial patches
//! under one critical section and publish a new snapshot atomically.

pub mod error;
pub mod options;
pub mod patch;
pub mod state;
pub mod store;

pub use error::{StateError, StateResult};
pub use options::StartupOptions;
pub use patch::{
    ArbPatch, CapitalPatch, OpsPatch, RuntimeStatePatch, ScalpPatch, SpotPatch,
};
pub use state::{
    ArbConfig, CapitalConfig, ManualStrategy, OpsConfig, RuntimeState, ScalpConfig, SpotConfig,
};
pub use store::RuntimeStateStore;
