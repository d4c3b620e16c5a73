//! Strategies and signal supervision.
//!
//! A closed set of strategy variants behind the `SignalGenerator` trait,
//! a name → strategy registry, per-symbol price history and the
//! supervisor that turns strategy output into a batch of `Signal`s.
//!
//! Nothing here calls a venue to trade; prices come in through
//! `observe` or a `PriceSource`.

pub mod backtest;
pub mod config;
pub mod error;
pub mod history;
pub mod registry;
pub mod source;
pub mod strategy;
pub mod supervisor;

pub use backtest::{backtest, BacktestReport, MAX_BACKTEST_DAYS};
pub use config::SupervisorConfig;
pub use error::{StrategyError, StrategyResult};
pub use history::PriceHistory;
pub use registry::StrategyRegistry;
pub use source::{BoxFuture, PriceSource};
pub use strategy::{SignalGenerator, Strategy, StrategyContext, StrategyOutput};
pub use supervisor::{ExecutionMode, SignalBatch, SignalSupervisor};
