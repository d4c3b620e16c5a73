//! Partial updates to `RuntimeState`.
//!
//! One patch type per section. `None` leaves a field untouched. Maps
//! (`reserves`, `spot.weights`, `arb.filters`) merge key by key; every
//! other field, including `manual_strategy` and its symbol list, is
//! replaced wholesale.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::state::{
    ArbConfig, CapitalConfig, ManualStrategy, OpsConfig, RuntimeState, ScalpConfig, SpotConfig,
};

/// Distinguishes an explicit `null` (clear) from an absent field (keep).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn merge_map<K: Ord + Clone, V: Clone>(target: &mut BTreeMap<K, V>, patch: &BTreeMap<K, V>) {
    for (k, v) in patch {
        target.insert(k.clone(), v.clone());
    }
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Patch for the whole aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_stop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arb_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sched_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_override: Option<bool>,
    /// `Some(None)` clears the manual strategy.
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub manual_strategy: Option<Option<ManualStrategy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalp: Option<ScalpPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arb: Option<ArbPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot: Option<SpotPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserves: Option<BTreeMap<String, Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ops: Option<OpsPatch>,
    /// `Some(None)` clears the override.
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub portfolio_equity: Option<Option<Decimal>>,
}

impl RuntimeStatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn auto_mode(mut self, on: bool) -> Self {
        self.auto_mode = Some(on);
        self
    }

    #[must_use]
    pub fn global_stop(mut self, on: bool) -> Self {
        self.global_stop = Some(on);
        self
    }

    #[must_use]
    pub fn trading_on(mut self, on: bool) -> Self {
        self.trading_on = Some(on);
        self
    }

    #[must_use]
    pub fn agent_on(mut self, on: bool) -> Self {
        self.agent_on = Some(on);
        self
    }

    #[must_use]
    pub fn arb_on(mut self, on: bool) -> Self {
        self.arb_on = Some(on);
        self
    }

    #[must_use]
    pub fn sched_on(mut self, on: bool) -> Self {
        self.sched_on = Some(on);
        self
    }

    #[must_use]
    pub fn manual_strategy(mut self, strategy: Option<ManualStrategy>) -> Self {
        self.manual_override = Some(strategy.is_some());
        self.manual_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn reserve(mut self, name: impl Into<String>, amount: Decimal) -> Self {
        self.reserves
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), amount);
        self
    }

    #[must_use]
    pub fn cap_pct(mut self, pct: Decimal) -> Self {
        let ops = self.ops.get_or_insert_with(OpsPatch::default);
        ops.capital.get_or_insert_with(CapitalPatch::default).cap_pct = Some(pct);
        self
    }

    #[must_use]
    pub fn spot(mut self, spot: SpotPatch) -> Self {
        self.spot = Some(spot);
        self
    }

    #[must_use]
    pub fn portfolio_equity(mut self, equity: Option<Decimal>) -> Self {
        self.portfolio_equity = Some(equity);
        self
    }

    /// True if the patch names no field at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch in place.
    pub fn apply_to(&self, state: &mut RuntimeState) {
        set(&mut state.auto_mode, &self.auto_mode);
        set(&mut state.global_stop, &self.global_stop);
        set(&mut state.trading_on, &self.trading_on);
        set(&mut state.agent_on, &self.agent_on);
        set(&mut state.arb_on, &self.arb_on);
        set(&mut state.sched_on, &self.sched_on);
        set(&mut state.manual_override, &self.manual_override);
        set(&mut state.manual_strategy, &self.manual_strategy);
        set(&mut state.portfolio_equity, &self.portfolio_equity);
        if let Some(scalp) = &self.scalp {
            scalp.apply_to(&mut state.scalp);
        }
        if let Some(arb) = &self.arb {
            arb.apply_to(&mut state.arb);
        }
        if let Some(spot) = &self.spot {
            spot.apply_to(&mut state.spot);
        }
        if let Some(reserves) = &self.reserves {
            merge_map(&mut state.reserves, reserves);
        }
        if let Some(ops) = &self.ops {
            ops.apply_to(&mut state.ops);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalpPatch {
    pub enabled: Option<bool>,
    pub qty_usd: Option<Decimal>,
    pub tp_pct: Option<Decimal>,
    pub sl_pct: Option<Decimal>,
}

impl ScalpPatch {
    fn apply_to(&self, scalp: &mut ScalpConfig) {
        set(&mut scalp.enabled, &self.enabled);
        set(&mut scalp.qty_usd, &self.qty_usd);
        set(&mut scalp.tp_pct, &self.tp_pct);
        set(&mut scalp.sl_pct, &self.sl_pct);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbPatch {
    pub auto_mode: Option<bool>,
    pub interval_secs: Option<u64>,
    pub threshold_pct: Option<Decimal>,
    pub qty_usd: Option<Decimal>,
    pub qty_min_usd: Option<Decimal>,
    pub qty_max_usd: Option<Decimal>,
    pub filters: Option<BTreeMap<String, String>>,
}

impl ArbPatch {
    fn apply_to(&self, arb: &mut ArbConfig) {
        set(&mut arb.auto_mode, &self.auto_mode);
        set(&mut arb.interval_secs, &self.interval_secs);
        set(&mut arb.threshold_pct, &self.threshold_pct);
        set(&mut arb.qty_usd, &self.qty_usd);
        set(&mut arb.qty_min_usd, &self.qty_min_usd);
        set(&mut arb.qty_max_usd, &self.qty_max_usd);
        if let Some(filters) = &self.filters {
            merge_map(&mut arb.filters, filters);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotPatch {
    pub enabled: Option<bool>,
    pub weights: Option<BTreeMap<String, Decimal>>,
    pub max_positions: Option<u32>,
    pub max_trade_pct: Option<Decimal>,
    pub risk_per_trade_pct: Option<Decimal>,
    pub max_symbol_exposure_pct: Option<Decimal>,
    pub tp_pct_default: Option<Decimal>,
    pub sl_pct_default: Option<Decimal>,
}

impl SpotPatch {
    fn apply_to(&self, spot: &mut SpotConfig) {
        set(&mut spot.enabled, &self.enabled);
        if let Some(weights) = &self.weights {
            merge_map(&mut spot.weights, weights);
        }
        set(&mut spot.max_positions, &self.max_positions);
        set(&mut spot.max_trade_pct, &self.max_trade_pct);
        set(&mut spot.risk_per_trade_pct, &self.risk_per_trade_pct);
        set(&mut spot.max_symbol_exposure_pct, &self.max_symbol_exposure_pct);
        set(&mut spot.tp_pct_default, &self.tp_pct_default);
        set(&mut spot.sl_pct_default, &self.sl_pct_default);
    }

    /// True if any of the per-trade risk fields is set.
    pub fn touches_risk(&self) -> bool {
        self.max_positions.is_some()
            || self.max_trade_pct.is_some()
            || self.risk_per_trade_pct.is_some()
            || self.max_symbol_exposure_pct.is_some()
            || self.tp_pct_default.is_some()
            || self.sl_pct_default.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsPatch {
    pub capital: Option<CapitalPatch>,
    pub max_leverage: Option<Decimal>,
}

impl OpsPatch {
    fn apply_to(&self, ops: &mut OpsConfig) {
        if let Some(capital) = &self.capital {
            capital.apply_to(&mut ops.capital);
        }
        set(&mut ops.max_leverage, &self.max_leverage);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalPatch {
    pub cap_pct: Option<Decimal>,
    pub hard_max_pct: Option<Decimal>,
}

impl CapitalPatch {
    fn apply_to(&self, capital: &mut CapitalConfig) {
        set(&mut capital.cap_pct, &self.cap_pct);
        set(&mut capital.hard_max_pct, &self.hard_max_pct);
    }
}
