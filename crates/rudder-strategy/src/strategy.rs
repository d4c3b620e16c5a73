//! Strategy variants.
//!
//! Every strategy is a pure function of a symbol's price history and the
//! context defaults. The set is closed; adding one means adding a
//! variant here and registering it.

use std::collections::BTreeMap;

use rudder_core::{OrderSide, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inputs shared by every strategy call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyContext {
    pub sl_pct_default: Decimal,
    pub tp_pct_default: Decimal,
    /// Price series per symbol, for strategies that look across symbols.
    pub reference_prices: BTreeMap<String, Vec<Price>>,
}

/// Raw strategy decision, before sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutput {
    pub symbol: String,
    pub side: OrderSide,
    pub take_pct: Decimal,
    pub stop_pct: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Decimal>,
}

/// Calling contract for strategies.
pub trait SignalGenerator {
    /// Produce zero or more decisions for `symbol`.
    ///
    /// `history` is oldest first. Must be deterministic and side-effect free.
    fn generate(
        &self,
        symbol: &str,
        history: &[Price],
        ctx: &StrategyContext,
    ) -> Vec<StrategyOutput>;
}

/// Bundled strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Trade in the direction of a break above the high / below the low
    /// of the previous `lookback` prices.
    ScalpingBreakout { lookback: usize },
    /// Fade moves more than `band_pct` (fraction) away from the
    /// `window`-period simple moving average.
    MeanReversion { window: usize, band_pct: Decimal },
    /// Trade crossovers of the `fast` and `slow` simple moving averages.
    TrendFollow { fast: usize, slow: usize },
}

impl Strategy {
    pub fn scalping_breakout() -> Self {
        Self::ScalpingBreakout { lookback: 20 }
    }

    pub fn mean_reversion() -> Self {
        Self::MeanReversion {
            window: 20,
            band_pct: Decimal::new(2, 2),
        }
    }

    pub fn trend_follow() -> Self {
        Self::TrendFollow { fast: 5, slow: 20 }
    }

    /// Parameters describe a usable window.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::ScalpingBreakout { lookback } => *lookback > 0,
            Self::MeanReversion { window, band_pct } => {
                *window > 0 && !band_pct.is_sign_negative()
            }
            Self::TrendFollow { fast, slow } => *fast > 0 && fast < slow,
        }
    }

    /// Minimum number of prices before the strategy can decide anything.
    pub fn warmup(&self) -> usize {
        match self {
            Self::ScalpingBreakout { lookback } => lookback + 1,
            Self::MeanReversion { window, .. } => *window,
            Self::TrendFollow { slow, .. } => slow + 1,
        }
    }
}

fn sma(prices: &[Price]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    let sum = prices
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.inner()))?;
    sum.checked_div(Decimal::from(prices.len() as u64))
}

/// `(value - base) / base`, `None` on a zero base or overflow.
fn relative(value: Decimal, base: Decimal) -> Option<Decimal> {
    if base.is_zero() {
        return None;
    }
    value.checked_sub(base)?.checked_div(base)
}

/// Confidence from a relative move: 100x the fraction, capped at 1.
fn confidence_from(fraction: Decimal) -> Decimal {
    fraction
        .abs()
        .checked_mul(Decimal::ONE_HUNDRED)
        .map_or(Decimal::ONE, |c| c.min(Decimal::ONE))
}

fn output(symbol: &str, side: OrderSide, ctx: &StrategyContext, conf: Decimal) -> StrategyOutput {
    StrategyOutput {
        symbol: symbol.to_string(),
        side,
        take_pct: ctx.tp_pct_default,
        stop_pct: ctx.sl_pct_default,
        confidence: Some(conf),
    }
}

impl SignalGenerator for Strategy {
    fn generate(
        &self,
        symbol: &str,
        history: &[Price],
        ctx: &StrategyContext,
    ) -> Vec<StrategyOutput> {
        if !self.is_well_formed() || history.len() < self.warmup() {
            return Vec::new();
        }
        let last = history[history.len() - 1];

        match self {
            Self::ScalpingBreakout { lookback } => {
                let window = &history[history.len() - 1 - lookback..history.len() - 1];
                let (Some(high), Some(low)) = (window.iter().max(), window.iter().min()) else {
                    return Vec::new();
                };
                if last > *high {
                    let conf = last.pct_from(*high).map(confidence_from).unwrap_or_default();
                    vec![output(symbol, OrderSide::Buy, ctx, conf)]
                } else if last < *low {
                    let conf = last.pct_from(*low).map(confidence_from).unwrap_or_default();
                    vec![output(symbol, OrderSide::Sell, ctx, conf)]
                } else {
                    Vec::new()
                }
            }
            Self::MeanReversion { window, band_pct } => {
                let Some(deviation) = sma(&history[history.len() - window..])
                    .and_then(|mean| relative(last.inner(), mean))
                else {
                    return Vec::new();
                };
                if deviation < -*band_pct {
                    vec![output(symbol, OrderSide::Buy, ctx, confidence_from(deviation))]
                } else if deviation > *band_pct {
                    vec![output(symbol, OrderSide::Sell, ctx, confidence_from(deviation))]
                } else {
                    Vec::new()
                }
            }
            Self::TrendFollow { fast, slow } => {
                let now = &history[history.len() - slow..];
                let prev = &history[history.len() - 1 - slow..history.len() - 1];
                let (Some(fast_now), Some(slow_now)) = (sma(&now[slow - fast..]), sma(now)) else {
                    return Vec::new();
                };
                let (Some(fast_prev), Some(slow_prev)) = (sma(&prev[slow - fast..]), sma(prev))
                else {
                    return Vec::new();
                };
                let Some(spread) = relative(fast_now, slow_now) else {
                    return Vec::new();
                };
                if fast_prev <= slow_prev && fast_now > slow_now {
                    vec![output(symbol, OrderSide::Buy, ctx, confidence_from(spread))]
                } else if fast_prev >= slow_prev && fast_now < slow_now {
                    vec![output(symbol, OrderSide::Sell, ctx, confidence_from(spread))]
                } else {
                    Vec::new()
                }
            }
        }
    }
}
