//! Name → strategy lookup.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{StrategyError, StrategyResult};
use crate::strategy::Strategy;

/// Immutable registry of strategies.
///
/// Built once with `register` and then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Strategy>,
}

impl StrategyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled strategies under their usual names.
    pub fn with_defaults() -> Self {
        let mut strategies = BTreeMap::new();
        strategies.insert("scalping_breakout".to_string(), Strategy::scalping_breakout());
        strategies.insert("mean_reversion".to_string(), Strategy::mean_reversion());
        strategies.insert("trend_follow".to_string(), Strategy::trend_follow());
        Self { strategies }
    }

    /// Add or replace a strategy. Rejects unusable parameters.
    pub fn register(mut self, name: impl Into<String>, strategy: Strategy) -> StrategyResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StrategyError::ConfigError(
                "strategy name must not be empty".to_string(),
            ));
        }
        if !strategy.is_well_formed() {
            return Err(StrategyError::ConfigError(format!(
                "strategy {name} has unusable parameters: {strategy:?}"
            )));
        }
        debug!(name = %name, ?strategy, "Registered strategy");
        self.strategies.insert(name, strategy);
        Ok(self)
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> StrategyResult<&Strategy> {
        self.strategies
            .get(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sorted() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["mean_reversion", "scalping_breakout", "trend_follow"]
        );
    }

    #[test]
    fn test_get_is_exact_match() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.get("trend_follow").is_ok());
        assert!(matches!(
            registry.get("Trend_Follow"),
            Err(StrategyError::NotFound(name)) if name == "Trend_Follow"
        ));
    }

    #[test]
    fn test_register_rejects_bad_parameters() {
        let result = StrategyRegistry::new().register("bad", Strategy::TrendFollow { fast: 5, slow: 5 });
        assert!(matches!(result, Err(StrategyError::ConfigError(_))));

        let registry = StrategyRegistry::new()
            .register("fast_breakout", Strategy::ScalpingBreakout { lookback: 5 })
            .unwrap();
        assert_eq!(registry.names(), vec!["fast_breakout"]);
    }
}
