//! Prometheus metrics for the rudder control plane.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error and should crash
//! at first use rather than silently drop data.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Orders submitted to the venue.
/// Labels: symbol, side
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rudder_orders_total",
        "Orders submitted to the venue",
        &["symbol", "side"]
    )
    .unwrap()
});

/// Signals rejected before reaching the venue.
/// Labels: reason (trading_disabled/budget_exceeded/leverage_limit/...)
pub static ORDERS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rudder_orders_rejected_total",
        "Signals rejected by a gate or risk check",
        &["reason"]
    )
    .unwrap()
});

/// Execution attempts by final status.
/// Labels: status (FILLED/PENDING/REJECTED)
pub static TRADES_RECORDED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rudder_trades_recorded_total",
        "Trade records appended, by status",
        &["status"]
    )
    .unwrap()
});

/// Venue failures.
/// Labels: op, code
pub static VENUE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rudder_venue_errors_total",
        "Venue call failures",
        &["op", "code"]
    )
    .unwrap()
});

/// Venue call latency in milliseconds.
pub static VENUE_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "rudder_venue_latency_ms",
        "Venue call latency in milliseconds",
        &["op"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Runtime state changes.
/// Labels: action
pub static STATE_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rudder_state_updates_total",
        "Runtime state changes applied",
        &["action"]
    )
    .unwrap()
});

/// Signals produced by strategies.
/// Labels: strategy
pub static SIGNALS_GENERATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rudder_signals_generated_total",
        "Signals produced by strategies",
        &["strategy"]
    )
    .unwrap()
});

/// Last computed account equity in USD.
pub static EQUITY_USD: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("rudder_equity_usd", "Last computed equity in USD").unwrap());

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record an order sent to the venue.
    pub fn order_submitted(symbol: &str, side: &str) {
        ORDERS_TOTAL.with_label_values(&[symbol, side]).inc();
    }

    /// Record a gate or risk rejection.
    pub fn order_rejected(reason: &str) {
        ORDERS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn trade_recorded(status: &str) {
        TRADES_RECORDED_TOTAL.with_label_values(&[status]).inc();
    }

    pub fn venue_error(op: &str, code: &str) {
        VENUE_ERRORS_TOTAL.with_label_values(&[op, code]).inc();
    }

    /// Record venue call latency.
    pub fn venue_latency(op: &str, latency_ms: f64) {
        VENUE_LATENCY_MS.with_label_values(&[op]).observe(latency_ms);
    }

    pub fn state_updated(action: &str) {
        STATE_UPDATES_TOTAL.with_label_values(&[action]).inc();
    }

    pub fn signals_generated(strategy: &str, count: usize) {
        SIGNALS_GENERATED_TOTAL
            .with_label_values(&[strategy])
            .inc_by(count as f64);
    }

    pub fn equity(value: f64) {
        EQUITY_USD.set(value);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_counter_increments() {
        let before = ORDERS_REJECTED_TOTAL
            .with_label_values(&["budget_exceeded"])
            .get();
        Metrics::order_rejected("budget_exceeded");
        let after = ORDERS_REJECTED_TOTAL
            .with_label_values(&["budget_exceeded"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_render_contains_metric_names() {
        Metrics::order_submitted("BTCUSDT", "BUY");
        Metrics::venue_latency("place_order", 3.0);
        let text = Metrics::render().unwrap();
        assert!(text.contains("rudder_orders_total"));
        assert!(text.contains("rudder_venue_latency_ms"));
    }
}
