//! SignalSupervisor: price history + registry → candidate signals.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rudder_core::{Price, Signal, Size};
use rudder_state::{RuntimeState, RuntimeStateStore};
use rudder_telemetry::Metrics;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::SupervisorConfig;
use crate::error::StrategyResult;
use crate::history::PriceHistory;
use crate::registry::StrategyRegistry;
use crate::source::PriceSource;
use crate::strategy::{SignalGenerator, Strategy, StrategyContext, StrategyOutput};

/// Decimal places kept on signal quantities.
const QTY_DP: u32 = 8;

/// Execution path a batch may be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionMode {
    Spot,
    Arb,
}

fn default_enable() -> BTreeMap<ExecutionMode, u8> {
    BTreeMap::from([(ExecutionMode::Spot, 1)])
}

/// Signals plus the per-mode enable flags they were produced under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBatch {
    pub signals: Vec<Signal>,
    /// Mode → 0 or 1.
    #[serde(default = "default_enable")]
    pub enable: BTreeMap<ExecutionMode, u8>,
}

impl SignalBatch {
    /// Batch with spot execution enabled.
    pub fn new(signals: Vec<Signal>) -> Self {
        Self {
            signals,
            enable: default_enable(),
        }
    }

    pub fn is_enabled(&self, mode: ExecutionMode) -> bool {
        self.enable.get(&mode).copied().unwrap_or(0) > 0
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Runs enabled strategies over recorded price history.
///
/// Thread-safe: share via `Arc<SignalSupervisor>`. History writes take a
/// short `parking_lot` lock that is never held across an await.
pub struct SignalSupervisor {
    registry: Arc<StrategyRegistry>,
    store: Arc<RuntimeStateStore>,
    history: RwLock<PriceHistory>,
    config: SupervisorConfig,
}

impl SignalSupervisor {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        store: Arc<RuntimeStateStore>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            history: RwLock::new(PriceHistory::new(config.history_capacity)),
            registry,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Record a price. Non-positive prices are ignored.
    pub fn observe(&self, symbol: &str, price: Price) {
        if !price.is_positive() {
            warn!(symbol, price = %price, "Ignoring non-positive price");
            return;
        }
        self.history.write().push(symbol, price);
    }

    /// Fetch prices for the configured symbols and record them.
    ///
    /// Failures are logged and skipped. Returns how many symbols were
    /// updated.
    pub async fn refresh_prices(&self, source: &dyn PriceSource) -> usize {
        let mut updated = 0;
        for symbol in &self.config.symbols {
            match source.last_price(symbol).await {
                Ok(price) if price.is_positive() => {
                    self.observe(symbol, price);
                    updated += 1;
                }
                Ok(price) => warn!(symbol = %symbol, price = %price, "Price source returned non-positive price"),
                Err(e) => warn!(symbol = %symbol, error = %e, "Price refresh failed"),
            }
        }
        trace!(updated, total = self.config.symbols.len(), "Prices refreshed");
        updated
    }

    /// Copy of the recorded series for `symbol`.
    pub fn history(&self, symbol: &str) -> Vec<Price> {
        self.history.read().series(symbol)
    }

    /// Strategy context from the current state and history.
    pub fn context(&self, state: &RuntimeState) -> StrategyContext {
        let history = self.history.read();
        let reference_prices = history
            .symbols()
            .map(|s| (s.to_string(), history.series(s)))
            .collect();
        StrategyContext {
            sl_pct_default: state.spot.sl_pct_default,
            tp_pct_default: state.spot.tp_pct_default,
            reference_prices,
        }
    }

    /// Names of the strategies that run under `state`, in sorted order.
    ///
    /// Spot weights > 0 select strategies; no positive weight (absent or all
    /// zero) selects every registered one, as the allocator splits evenly. Manual override narrows the set to the pinned
    /// strategy. Names the registry does not know are skipped.
    pub fn enabled_strategies(&self, state: &RuntimeState) -> Vec<String> {
        if let Some(manual) = state.manual_strategy_name() {
            if self.registry.contains(manual) {
                return vec![manual.to_string()];
            }
            warn!(strategy = manual, "Manual strategy is not registered");
            return Vec::new();
        }

        let positive = |w: &Decimal| w.is_sign_positive() && !w.is_zero();
        if !state.spot.weights.values().any(positive) {
            return self.registry.names().into_iter().map(str::to_string).collect();
        }

        state
            .spot
            .weights
            .iter()
            .filter(|(_, w)| positive(*w))
            .filter_map(|(name, _)| {
                if self.registry.contains(name) {
                    Some(name.clone())
                } else {
                    debug!(strategy = %name, "Weighted strategy is not registered");
                    None
                }
            })
            .collect()
    }

    /// Run every enabled strategy over every symbol with history.
    ///
    /// Deterministic for a given state and history; never calls a venue.
    pub fn get_signals(&self) -> SignalBatch {
        let state = self.store.get();
        let ctx = self.context(&state);
        let symbols = self.target_symbols(&state, &ctx);

        let mut signals = Vec::new();
        for name in self.enabled_strategies(&state) {
            let Ok(strategy) = self.registry.get(&name) else {
                continue;
            };
            let produced = self.run_over(&name, strategy, &symbols, &ctx);
            if !produced.is_empty() {
                Metrics::signals_generated(&name, produced.len());
            }
            signals.extend(produced);
        }

        let enable = BTreeMap::from([
            (ExecutionMode::Spot, u8::from(state.spot.enabled)),
            (ExecutionMode::Arb, u8::from(state.arb_on)),
        ]);

        debug!(
            signals = signals.len(),
            symbols = symbols.len(),
            spot = state.spot.enabled,
            arb = state.arb_on,
            "Signal batch generated"
        );
        SignalBatch { signals, enable }
    }

    /// Run one named strategy, optionally for a single symbol.
    ///
    /// Unknown names fail before anything runs.
    pub fn run_strategy(&self, name: &str, symbol: Option<&str>) -> StrategyResult<Vec<Signal>> {
        let strategy = self.registry.get(name)?;
        let state = self.store.get();
        let ctx = self.context(&state);
        let symbols = match symbol {
            Some(s) => vec![s.to_string()],
            None => ctx.reference_prices.keys().cloned().collect(),
        };
        Ok(self.run_over(name, strategy, &symbols, &ctx))
    }

    fn target_symbols(&self, state: &RuntimeState, ctx: &StrategyContext) -> Vec<String> {
        let manual_symbols = state
            .manual_strategy_name()
            .and(state.manual_strategy.as_ref())
            .map(|m| m.symbols.as_slice())
            .unwrap_or_default();

        ctx.reference_prices
            .keys()
            .filter(|s| manual_symbols.is_empty() || manual_symbols.iter().any(|m| m == *s))
            .cloned()
            .collect()
    }

    fn run_over(
        &self,
        name: &str,
        strategy: &Strategy,
        symbols: &[String],
        ctx: &StrategyContext,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();
        for symbol in symbols {
            let Some(history) = ctx.reference_prices.get(symbol) else {
                continue;
            };
            let Some(last) = history.last().copied() else {
                continue;
            };
            for output in strategy.generate(symbol, history, ctx) {
                if let Some(signal) = self.to_signal(name, &output, last) {
                    signals.push(signal);
                }
            }
        }
        signals
    }

    fn to_signal(&self, name: &str, output: &StrategyOutput, last: Price) -> Option<Signal> {
        if !last.is_positive() {
            return None;
        }
        let Some(raw) = self.config.quote_notional_usd.checked_div(last.inner()) else {
            debug!(strategy = name, symbol = %output.symbol, price = %last, "Signal quantity overflows");
            return None;
        };
        let qty = raw.round_dp_with_strategy(QTY_DP, RoundingStrategy::ToZero);
        if qty <= Decimal::ZERO {
            debug!(strategy = name, symbol = %output.symbol, "Signal quantity rounds to zero");
            return None;
        }

        match Signal::new(&output.symbol, output.side, Size::new(qty)) {
            Ok(signal) => {
                let signal = signal.with_strategy(name);
                Some(match output.confidence {
                    Some(c) => signal.with_confidence(c),
                    None => signal,
                })
            }
            Err(e) => {
                warn!(strategy = name, error = %e, "Dropping malformed strategy output");
                None
            }
        }
    }
}
