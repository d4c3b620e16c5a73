//! The runtime state aggregate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Process-wide operating configuration.
///
/// Every field has a default so a partially specified document still
/// deserializes. Maps are `BTreeMap` so snapshots serialize in a stable
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeState {
    /// Automatic signal execution enabled.
    pub auto_mode: bool,
    /// Emergency stop. Blocks every execution path while set.
    pub global_stop: bool,
    /// Master trading switch.
    pub trading_on: bool,
    pub agent_on: bool,
    pub arb_on: bool,
    pub sched_on: bool,
    /// Restrict signal generation to `manual_strategy`.
    pub manual_override: bool,
    pub manual_strategy: Option<ManualStrategy>,
    pub scalp: ScalpConfig,
    pub arb: ArbConfig,
    pub spot: SpotConfig,
    /// USD amounts withheld from allocation, keyed by purpose.
    pub reserves: BTreeMap<String, Decimal>,
    pub ops: OpsConfig,
    /// Operator-supplied equity, used as the quote balance when set.
    pub portfolio_equity: Option<Decimal>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        let mut reserves = BTreeMap::new();
        reserves.insert("portfolio".to_string(), Decimal::ZERO);
        reserves.insert("arbitrage".to_string(), Decimal::ZERO);
        Self {
            auto_mode: false,
            global_stop: false,
            trading_on: true,
            agent_on: true,
            arb_on: false,
            sched_on: true,
            manual_override: false,
            manual_strategy: None,
            scalp: ScalpConfig::default(),
            arb: ArbConfig::default(),
            spot: SpotConfig::default(),
            reserves,
            ops: OpsConfig::default(),
            portfolio_equity: None,
        }
    }
}

impl RuntimeState {
    /// Sum of all reserves. Negative entries count as zero.
    pub fn total_reserves(&self) -> Decimal {
        self.reserves
            .values()
            .filter(|v| v.is_sign_positive())
            .copied()
            .sum()
    }

    /// Name of the manually selected strategy, if manual override is active.
    pub fn manual_strategy_name(&self) -> Option<&str> {
        if !self.manual_override {
            return None;
        }
        self.manual_strategy.as_ref().map(|m| m.name.as_str())
    }
}

/// Strategy pinned by the operator while `manual_override` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualStrategy {
    pub name: String,
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Scalping loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalpConfig {
    pub enabled: bool,
    pub qty_usd: Decimal,
    pub tp_pct: Decimal,
    pub sl_pct: Decimal,
}

impl Default for ScalpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            qty_usd: Decimal::from(50),
            tp_pct: Decimal::new(30, 2),
            sl_pct: Decimal::new(15, 2),
        }
    }
}

/// Arbitrage scanner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbConfig {
    pub auto_mode: bool,
    pub interval_secs: u64,
    /// Minimum spread to act on, in percent.
    pub threshold_pct: Decimal,
    pub qty_usd: Decimal,
    pub qty_min_usd: Decimal,
    pub qty_max_usd: Decimal,
    pub filters: BTreeMap<String, String>,
}

impl Default for ArbConfig {
    fn default() -> Self {
        Self {
            auto_mode: false,
            interval_secs: 60,
            threshold_pct: Decimal::new(5, 1),
            qty_usd: Decimal::from(50),
            qty_min_usd: Decimal::from(10),
            qty_max_usd: Decimal::from(500),
            filters: BTreeMap::new(),
        }
    }
}

/// Spot portfolio policy: strategy weights and per-trade limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotConfig {
    pub enabled: bool,
    /// Strategy name → relative weight. Empty means "all equally".
    pub weights: BTreeMap<String, Decimal>,
    pub max_positions: u32,
    /// Fraction of equity any single trade may use.
    pub max_trade_pct: Decimal,
    pub risk_per_trade_pct: Decimal,
    /// Fraction of equity a single order may represent.
    pub max_symbol_exposure_pct: Decimal,
    pub tp_pct_default: Decimal,
    pub sl_pct_default: Decimal,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weights: BTreeMap::new(),
            max_positions: 5,
            max_trade_pct: Decimal::new(20, 2),
            risk_per_trade_pct: Decimal::new(5, 3),
            max_symbol_exposure_pct: Decimal::new(35, 2),
            tp_pct_default: Decimal::new(30, 2),
            sl_pct_default: Decimal::new(15, 2),
        }
    }
}

/// Operations policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub capital: CapitalConfig,
    pub max_leverage: Decimal,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            capital: CapitalConfig::default(),
            max_leverage: Decimal::from(20),
        }
    }
}

/// Share of equity made available for trading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalConfig {
    pub cap_pct: Decimal,
    /// Ceiling an operator may raise `cap_pct` to.
    pub hard_max_pct: Decimal,
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            cap_pct: Decimal::new(25, 2),
            hard_max_pct: Decimal::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_flags() {
        let state = RuntimeState::default();
        assert!(state.trading_on);
        assert!(state.agent_on);
        assert!(state.sched_on);
        assert!(!state.auto_mode);
        assert!(!state.global_stop);
        assert_eq!(state.ops.capital.cap_pct, dec!(0.25));
        assert_eq!(state.spot.max_symbol_exposure_pct, dec!(0.35));
        assert_eq!(state.ops.max_leverage, dec!(20));
    }

    #[test]
    fn test_total_reserves_ignores_negative() {
        let mut state = RuntimeState::default();
        state.reserves.insert("portfolio".into(), dec!(300));
        state.reserves.insert("arbitrage".into(), dec!(-50));
        assert_eq!(state.total_reserves(), dec!(300));
    }

    #[test]
    fn test_manual_strategy_requires_override() {
        let mut state = RuntimeState::default();
        state.manual_strategy = Some(ManualStrategy {
            name: "trend_follow".into(),
            symbols: vec![],
        });
        assert_eq!(state.manual_strategy_name(), None);
        state.manual_override = true;
        assert_eq!(state.manual_strategy_name(), Some("trend_follow"));
    }

    #[test]
    fn test_partial_document_deserializes() {
        let state: RuntimeState =
            serde_json::from_str(r#"{"auto_mode": true, "spot": {"max_positions": 3}}"#).unwrap();
        assert!(state.auto_mode);
        assert_eq!(state.spot.max_positions, 3);
        assert_eq!(state.spot.max_trade_pct, dec!(0.20));
    }
}
