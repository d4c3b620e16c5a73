//! Capital allocation across strategies.
//!
//! Turns account equity, the operator's capital cap and reserves into a
//! budget per strategy. The allocator owns no state beyond its policy
//! and the set of strategy names it knows about.

use std::collections::BTreeMap;

use rudder_core::Price;
use rudder_state::SpotConfig;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{RiskError, RiskResult};

/// Decimal places kept on budget shares. Shares are truncated so the
/// sum of budgets never exceeds tradable equity.
const BUDGET_DP: u32 = 8;

/// Allocator policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Fraction of equity a single strategy budget (or trade) may use.
    pub max_trade_pct: Decimal,
    pub risk_per_trade_pct: Decimal,
    /// Fraction of equity a single order may represent.
    pub max_symbol_exposure_pct: Decimal,
    pub max_positions: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_trade_pct: Decimal::new(20, 2),
            risk_per_trade_pct: Decimal::new(5, 3),
            max_symbol_exposure_pct: Decimal::new(35, 2),
            max_positions: 5,
        }
    }
}

impl AllocatorConfig {
    pub fn from_spot(spot: &SpotConfig) -> Self {
        Self {
            max_trade_pct: spot.max_trade_pct,
            risk_per_trade_pct: spot.risk_per_trade_pct,
            max_symbol_exposure_pct: spot.max_symbol_exposure_pct,
            max_positions: spot.max_positions,
        }
    }

    /// Validate that every fraction lies in [0, 1].
    pub fn validate(&self) -> RiskResult<()> {
        for (name, value) in [
            ("max_trade_pct", self.max_trade_pct),
            ("risk_per_trade_pct", self.risk_per_trade_pct),
            ("max_symbol_exposure_pct", self.max_symbol_exposure_pct),
        ] {
            if value.is_sign_negative() || value > Decimal::ONE {
                return Err(RiskError::ConfigError(format!(
                    "{name} ({value}) must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Budget breakdown for one allocation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalAllocation {
    pub tradable_equity: Price,
    pub per_strategy: BTreeMap<String, Price>,
}

impl CapitalAllocation {
    /// Budget for `strategy`; strategies absent from the allocation get zero.
    pub fn budget_for(&self, strategy: &str) -> Price {
        self.per_strategy
            .get(strategy)
            .copied()
            .unwrap_or(Price::ZERO)
    }

    pub fn total_allocated(&self) -> Price {
        self.per_strategy
            .values()
            .fold(Price::ZERO, |acc, budget| acc + *budget)
    }
}

/// Computes per-strategy budgets.
#[derive(Debug, Clone, Default)]
pub struct CapitalAllocator {
    config: AllocatorConfig,
    strategies: Vec<String>,
}

impl CapitalAllocator {
    #[must_use]
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            strategies: Vec::new(),
        }
    }

    /// Register the strategy names that share capital when no weights are set.
    #[must_use]
    pub fn with_strategies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strategies = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Largest order notional a single trade may take.
    pub fn max_order_notional(&self, equity: Price) -> Price {
        equity.floor_zero() * self.config.max_trade_pct
    }

    /// Amount of equity a single trade may put at risk.
    pub fn risk_budget(&self, equity: Price) -> Price {
        equity.floor_zero() * self.config.risk_per_trade_pct
    }

    /// Split tradable equity across strategies.
    ///
    /// `tradable = max(0, equity * cap_pct - reserves)`, with `cap_pct`
    /// clamped into [0, 1], negative equity treated as zero and negative
    /// reserves ignored. Positive weights share `tradable` proportionally;
    /// with no positive weight it is split evenly over the known
    /// strategies. Every budget is capped at `max_trade_pct * equity`.
    pub fn compute_budgets(
        &self,
        equity: Price,
        cap_pct: Decimal,
        reserves: &BTreeMap<String, Decimal>,
        weights: &BTreeMap<String, Decimal>,
    ) -> CapitalAllocation {
        let equity = equity.floor_zero();
        let cap_pct = cap_pct.clamp(Decimal::ZERO, Decimal::ONE);
        let reserved: Decimal = reserves
            .values()
            .filter(|v| v.is_sign_positive())
            .copied()
            .sum();
        let tradable = Price::new(equity.inner() * cap_pct - reserved).floor_zero();
        let per_trade_cap = self.max_order_notional(equity);

        let positive_total: Decimal = weights
            .values()
            .filter(|w| w.is_sign_positive())
            .copied()
            .sum();

        let mut per_strategy = BTreeMap::new();
        if positive_total.is_zero() {
            if !self.strategies.is_empty() {
                let count = Decimal::from(self.strategies.len() as u64);
                let share = truncate(tradable.inner() / count);
                for name in &self.strategies {
                    per_strategy.insert(name.clone(), share);
                }
            }
            for name in weights.keys() {
                per_strategy.entry(name.clone()).or_insert(Decimal::ZERO);
            }
        } else {
            for name in &self.strategies {
                per_strategy.insert(name.clone(), Decimal::ZERO);
            }
            for (name, weight) in weights {
                let share = if weight.is_sign_positive() {
                    truncate(tradable.inner() * *weight / positive_total)
                } else {
                    Decimal::ZERO
                };
                per_strategy.insert(name.clone(), share);
            }
        }

        let per_strategy = per_strategy
            .into_iter()
            .map(|(name, share)| (name, Price::new(share).min(per_trade_cap)))
            .collect::<BTreeMap<_, _>>();

        trace!(
            equity = %equity,
            cap_pct = %cap_pct,
            reserved = %reserved,
            tradable = %tradable,
            strategies = per_strategy.len(),
            "Computed capital allocation"
        );

        CapitalAllocation {
            tradable_equity: tradable,
            per_strategy,
        }
    }
}

fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(BUDGET_DP, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reserves(pairs: &[(&str, Decimal)]) -> BTreeMap<String, Decimal> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn allocator() -> CapitalAllocator {
        CapitalAllocator::new(AllocatorConfig::default()).with_strategies([
            "mean_reversion",
            "scalping_breakout",
            "trend_follow",
        ])
    }

    #[test]
    fn test_tradable_equity_example() {
        let alloc = allocator().compute_budgets(
            Price::new(dec!(10000)),
            dec!(0.25),
            &reserves(&[("arbitrage", dec!(500))]),
            &BTreeMap::new(),
        );
        assert_eq!(alloc.tradable_equity, Price::new(dec!(2000)));
    }

    #[test]
    fn test_tradable_never_negative() {
        let alloc = allocator().compute_budgets(
            Price::new(dec!(1000)),
            dec!(0.25),
            &reserves(&[("portfolio", dec!(5000))]),
            &BTreeMap::new(),
        );
        assert_eq!(alloc.tradable_equity, Price::ZERO);
        assert_eq!(alloc.total_allocated(), Price::ZERO);

        let alloc = allocator().compute_budgets(
            Price::new(dec!(-100)),
            dec!(0.25),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert_eq!(alloc.tradable_equity, Price::ZERO);
    }

    #[test]
    fn test_cap_pct_is_clamped() {
        let alloc = allocator().compute_budgets(
            Price::new(dec!(1000)),
            dec!(3),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert_eq!(alloc.tradable_equity, Price::new(dec!(1000)));

        let alloc = allocator().compute_budgets(
            Price::new(dec!(1000)),
            dec!(-1),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert_eq!(alloc.tradable_equity, Price::ZERO);
    }

    #[test]
    fn test_even_split_without_weights() {
        let alloc = allocator().compute_budgets(
            Price::new(dec!(10000)),
            dec!(0.3),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        // 3000 split three ways
        assert_eq!(alloc.budget_for("trend_follow"), Price::new(dec!(1000)));
        assert_eq!(alloc.per_strategy.len(), 3);
        assert!(alloc.total_allocated() <= alloc.tradable_equity);
    }

    #[test]
    fn test_even_split_truncates_to_stay_within_tradable() {
        let alloc = allocator().compute_budgets(
            Price::new(dec!(100)),
            dec!(1),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert!(alloc.total_allocated() <= alloc.tradable_equity);
    }

    #[test]
    fn test_proportional_weights_and_negative_weight() {
        let weights = reserves(&[
            ("trend_follow", dec!(3)),
            ("mean_reversion", dec!(1)),
            ("scalping_breakout", dec!(-2)),
        ]);
        let alloc = allocator().compute_budgets(
            Price::new(dec!(100000)),
            dec!(0.04),
            &BTreeMap::new(),
            &weights,
        );
        // tradable 4000: 3000 / 1000 / 0
        assert_eq!(alloc.budget_for("trend_follow"), Price::new(dec!(3000)));
        assert_eq!(alloc.budget_for("mean_reversion"), Price::new(dec!(1000)));
        assert_eq!(alloc.budget_for("scalping_breakout"), Price::ZERO);
    }

    #[test]
    fn test_known_strategy_without_weight_gets_zero() {
        let weights = reserves(&[("trend_follow", dec!(1))]);
        let alloc = allocator().compute_budgets(
            Price::new(dec!(10000)),
            dec!(0.1),
            &BTreeMap::new(),
            &weights,
        );
        assert_eq!(alloc.budget_for("mean_reversion"), Price::ZERO);
        assert_eq!(alloc.budget_for("trend_follow"), Price::new(dec!(1000)));
    }

    #[test]
    fn test_budget_capped_at_max_trade_pct() {
        let weights = reserves(&[("trend_follow", dec!(1))]);
        let alloc = allocator().compute_budgets(
            Price::new(dec!(10000)),
            dec!(1),
            &BTreeMap::new(),
            &weights,
        );
        assert_eq!(alloc.tradable_equity, Price::new(dec!(10000)));
        assert_eq!(alloc.budget_for("trend_follow"), Price::new(dec!(2000)));
    }

    #[test]
    fn test_unknown_strategy_budget_is_zero() {
        let alloc = allocator().compute_budgets(
            Price::new(dec!(10000)),
            dec!(0.25),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert_eq!(alloc.budget_for("does_not_exist"), Price::ZERO);
    }

    #[test]
    fn test_invariants_over_grid() {
        let equities = [dec!(0), dec!(1), dec!(333.33), dec!(10000), dec!(1234567)];
        let caps = [dec!(0), dec!(0.1), dec!(0.25), dec!(1)];
        let weight_sets = [
            BTreeMap::new(),
            reserves(&[("trend_follow", dec!(1)), ("mean_reversion", dec!(2))]),
            reserves(&[("trend_follow", dec!(0))]),
        ];
        let reserve = reserves(&[("arbitrage", dec!(50))]);

        for equity in equities {
            for cap in caps {
                for weights in &weight_sets {
                    let alloc = allocator().compute_budgets(
                        Price::new(equity),
                        cap,
                        &reserve,
                        weights,
                    );
                    assert!(!alloc.tradable_equity.inner().is_sign_negative());
                    assert!(alloc.total_allocated() <= alloc.tradable_equity);
                    for budget in alloc.per_strategy.values() {
                        assert!(*budget <= Price::new(equity * dec!(0.20)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_from_spot_and_helpers() {
        let spot = SpotConfig {
            max_trade_pct: dec!(0.1),
            risk_per_trade_pct: dec!(0.01),
            ..SpotConfig::default()
        };
        let allocator = CapitalAllocator::new(AllocatorConfig::from_spot(&spot));
        assert_eq!(
            allocator.max_order_notional(Price::new(dec!(5000))),
            Price::new(dec!(500))
        );
        assert_eq!(
            allocator.risk_budget(Price::new(dec!(5000))),
            Price::new(dec!(50))
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(AllocatorConfig::default().validate().is_ok());
        let bad = AllocatorConfig {
            max_trade_pct: dec!(1.5),
            ..AllocatorConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
