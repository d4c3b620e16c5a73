//! End-to-end tests of the control plane over the paper venue.
//!
//! Signals come from real strategies over recorded history, go through
//! the execution agent and land in the journal and portfolio.

use std::collections::HashMap;

use rudder_bot::{AppConfig, Application};
use rudder_core::{Price, TradeStatus};
use rudder_executor::{Grants, Role, VenueOp};
use rudder_state::StartupOptions;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.supervisor.symbols = vec!["BTCUSDT".to_string()];
    config.paper.prices.insert("BTCUSDT".to_string(), dec!(100));
    config.paper.drift_pct = Decimal::ZERO;
    config
}

fn auto_options() -> StartupOptions {
    StartupOptions {
        auto_mode: true,
        cap_pct: dec!(1),
        ..StartupOptions::default()
    }
}

/// Twenty flat prices then a jump: every default strategy fires once.
fn seed_breakout(app: &Application) {
    for _ in 0..20 {
        app.supervisor().observe("BTCUSDT", Price::new(dec!(100)));
    }
    app.supervisor().observe("BTCUSDT", Price::new(dec!(110)));
    app.venue().set_price("BTCUSDT", Price::new(dec!(110)));
}

#[tokio::test]
async fn test_breakout_signals_fill_on_paper_venue() {
    let app = Application::with_options(config(), auto_options()).unwrap();
    seed_breakout(&app);

    let batch = app.supervisor().get_signals();
    assert_eq!(batch.len(), 3);

    let summary = app.agent().execute_signals(&batch).await;
    assert_eq!(summary.executed, 3);
    assert!(summary.errors.is_empty());

    let records = app.agent().journal().records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == TradeStatus::Filled));
    assert!(records.iter().all(|r| r.strategy.is_some()));
    assert_eq!(app.agent().with_portfolio(|p| p.fill_count()), 3);
}

#[tokio::test]
async fn test_stop_all_blocks_execution() {
    let app = Application::with_options(config(), auto_options()).unwrap();
    seed_breakout(&app);

    let trader = Grants::new("ops", Role::Trader);
    app.controller().stop_all(&trader).unwrap();

    let batch = app.supervisor().get_signals();
    let summary = app.agent().execute_signals(&batch).await;
    assert_eq!(summary.executed, 0);
    assert_eq!(summary.errors.len(), batch.len());
    assert!(summary
        .errors
        .iter()
        .all(|e| e.reason == "trading_disabled"));
    assert_eq!(app.venue().call_count(VenueOp::PlaceOrder), 0);

    app.controller().start_all(&trader).unwrap();
    let summary = app.agent().execute_signals(&batch).await;
    assert_eq!(summary.executed, batch.len());
}

#[tokio::test]
async fn test_ticks_journal_every_signal() {
    let mut cfg = config();
    cfg.paper.drift_pct = dec!(0.05);
    let mut app = Application::with_options(cfg, auto_options()).unwrap();

    let mut attempts = 0;
    for _ in 0..40 {
        if let Some(summary) = app.tick().await {
            attempts += summary.executed + summary.errors.len();
        }
    }
    assert_eq!(app.supervisor().history("BTCUSDT").len(), 40);
    assert_eq!(app.agent().journal().len(), attempts);
}

#[test]
fn test_environment_options_drive_capital() {
    let env: HashMap<String, String> = [
        ("RUDDER_CAP_PCT", "0.5"),
        ("RUDDER_RESERVE_ARBITRAGE", "500"),
        ("RUDDER_PORTFOLIO_EQUITY", "10000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let options = StartupOptions::load_with(None, Some(env)).unwrap();

    let app = Application::with_options(config(), options).unwrap();
    let capital = app.agent().capital_snapshot();
    assert_eq!(capital.equity, Price::new(dec!(10000)));
    assert_eq!(capital.allocation.tradable_equity, Price::new(dec!(4500)));
}

#[test]
fn test_backtest_via_application() {
    let app = Application::with_options(config(), auto_options()).unwrap();
    let report = app.backtest("scalping_breakout", "BTCUSDT", 7).unwrap();
    assert_eq!(report.strategy, "scalping_breakout");
    assert_eq!(report.trades, 0);
}
