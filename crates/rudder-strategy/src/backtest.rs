//! Naive strategy backtest.
//!
//! Replays a strategy once per simulated day over a synthetic series
//! that drifts up 0.1% per day from the last known price. The PnL
//! figure is a rough estimate: the sum of each trade's take-profit
//! minus stop-loss percentage.

use rudder_core::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StrategyError, StrategyResult};
use crate::registry::StrategyRegistry;
use crate::strategy::{SignalGenerator, StrategyContext};

/// Daily drift applied to the synthetic series.
const DAILY_DRIFT: Decimal = Decimal::from_parts(1001, 0, 0, false, 3);

/// Longest replay accepted, in days.
pub const MAX_BACKTEST_DAYS: u32 = 3650;

/// Seed price when no history is available.
const SEED_PRICE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub symbol: String,
    pub trades: usize,
    pub pnl_estimate_pct: Decimal,
}

/// Run `name` over `history` for `days` steps (at least one, at most
/// [`MAX_BACKTEST_DAYS`]).
///
/// Unknown strategy names and out-of-range `days` fail before anything
/// runs. The series stops growing once the next price would overflow.
pub fn backtest(
    registry: &StrategyRegistry,
    name: &str,
    symbol: &str,
    history: &[Price],
    days: u32,
    ctx: &StrategyContext,
) -> StrategyResult<BacktestReport> {
    let strategy = registry.get(name)?;
    if days > MAX_BACKTEST_DAYS {
        return Err(StrategyError::ConfigError(format!(
            "backtest days must be at most {MAX_BACKTEST_DAYS}, got {days}"
        )));
    }

    let mut prices: Vec<Price> = if history.is_empty() {
        vec![Price::new(SEED_PRICE)]
    } else {
        history.to_vec()
    };

    let mut trades = 0;
    let mut pnl_estimate_pct = Decimal::ZERO;
    for _ in 0..days.max(1) {
        for output in strategy.generate(symbol, &prices, ctx) {
            trades += 1;
            pnl_estimate_pct += output.take_pct - output.stop_pct;
        }
        let last = prices[prices.len() - 1];
        let Some(next) = last.checked_mul(DAILY_DRIFT) else {
            debug!(strategy = name, symbol, last = %last, "Backtest series overflowed, stopping");
            break;
        };
        prices.push(next);
    }

    debug!(
        strategy = name,
        symbol,
        days,
        trades,
        pnl_estimate_pct = %pnl_estimate_pct,
        "Backtest finished"
    );

    Ok(BacktestReport {
        strategy: name.to_string(),
        symbol: symbol.to_string(),
        trades,
        pnl_estimate_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn ctx() -> StrategyContext {
        StrategyContext {
            sl_pct_default: dec!(0.15),
            tp_pct_default: dec!(0.30),
            reference_prices: BTreeMap::new(),
        }
    }

    #[test]
    fn test_breakout_on_rising_series() {
        let registry = StrategyRegistry::with_defaults();
        let history = vec![Price::new(dec!(100)); 21];

        let report = backtest(&registry, "scalping_breakout", "BTCUSDT", &history, 3, &ctx())
            .unwrap();

        // Day 1 is flat; days 2 and 3 break out above the previous high.
        assert_eq!(report.trades, 2);
        assert_eq!(report.pnl_estimate_pct, dec!(0.30));
        assert_eq!(report.strategy, "scalping_breakout");
    }

    #[test]
    fn test_empty_history_is_seeded() {
        let registry = StrategyRegistry::with_defaults();
        let report = backtest(&registry, "mean_reversion", "ETHUSDT", &[], 0, &ctx()).unwrap();
        assert_eq!(report.trades, 0);
        assert_eq!(report.pnl_estimate_pct, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = StrategyRegistry::with_defaults();
        let result = backtest(&registry, "nope", "BTCUSDT", &[], 7, &ctx());
        assert!(matches!(result, Err(StrategyError::NotFound(_))));
    }

    #[test]
    fn test_days_are_bounded() {
        let registry = StrategyRegistry::with_defaults();
        let result = backtest(
            &registry,
            "trend_follow",
            "BTCUSDT",
            &[],
            MAX_BACKTEST_DAYS + 1,
            &ctx(),
        );
        assert!(matches!(result, Err(StrategyError::ConfigError(_))));
        assert!(backtest(&registry, "trend_follow", "BTCUSDT", &[], MAX_BACKTEST_DAYS, &ctx()).is_ok());
    }

    #[test]
    fn test_series_at_decimal_max_stops_without_panic() {
        let registry = StrategyRegistry::with_defaults();
        let history = [Price::new(Decimal::MAX)];
        for name in registry.names() {
            let report = backtest(&registry, name, "BTCUSDT", &history, 5, &ctx()).unwrap();
            assert_eq!(report.trades, 0);
        }
    }
}
