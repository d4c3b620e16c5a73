//! Application wiring and tick loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rudder_core::Price;
use rudder_executor::{
    AgentConfig, Balance, ExecutionAgent, ExecutionSummary, OpsController, PaperVenue,
    TracingAuditSink, VenuePriceSource,
};
use rudder_state::{RuntimeState, RuntimeStateStore, StartupOptions};
use rudder_strategy::{backtest, BacktestReport, SignalSupervisor, StrategyRegistry};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Phase step of the synthetic price wave, in radians per tick.
const WAVE_STEP: f64 = 0.3;

pub struct Application {
    config: AppConfig,
    store: Arc<RuntimeStateStore>,
    venue: Arc<PaperVenue>,
    supervisor: SignalSupervisor,
    agent: Arc<ExecutionAgent>,
    controller: OpsController,
    prices: VenuePriceSource,
    tick: u64,
}

impl Application {
    /// Build the application, reading start-up options from the
    /// environment (and `options_file` when set).
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let options = StartupOptions::load_with(config.options_file.as_deref().map(Path::new), None)?;
        Self::with_options(config, options)
    }

    pub fn with_options(config: AppConfig, options: StartupOptions) -> AppResult<Self> {
        config.validate().map_err(AppError::Config)?;

        let store = Arc::new(RuntimeStateStore::new(RuntimeState::from(options)));
        let registry = Arc::new(StrategyRegistry::with_defaults());
        let audit = Arc::new(TracingAuditSink);

        let venue = Arc::new(PaperVenue::new());
        for (symbol, price) in &config.paper.prices {
            venue.set_price(symbol, Price::new(*price));
        }
        for (asset, amount) in &config.paper.balances {
            venue.set_balance(asset, Balance::new(*amount, Decimal::ZERO));
        }
        venue.set_latency(Duration::from_millis(config.paper.latency_ms));

        let supervisor = SignalSupervisor::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            config.supervisor.clone(),
        );
        let agent = ExecutionAgent::new(
            Arc::clone(&store),
            venue.clone(),
            audit.clone(),
            config.agent.clone(),
        )
        .with_strategies(registry.names());
        let controller = OpsController::new(Arc::clone(&store), audit);
        let prices = VenuePriceSource::new(venue.clone(), config.agent.venue_timeout());

        Ok(Self {
            config,
            store,
            venue,
            supervisor,
            agent: Arc::new(agent),
            controller,
            prices,
            tick: 0,
        })
    }

    pub fn store(&self) -> &Arc<RuntimeStateStore> {
        &self.store
    }

    pub fn venue(&self) -> &Arc<PaperVenue> {
        &self.venue
    }

    pub fn supervisor(&self) -> &SignalSupervisor {
        &self.supervisor
    }

    pub fn agent(&self) -> &Arc<ExecutionAgent> {
        &self.agent
    }

    pub fn controller(&self) -> &OpsController {
        &self.controller
    }

    pub fn agent_config(&self) -> &AgentConfig {
        &self.config.agent
    }

    /// One scheduler pass: move paper prices, refresh history, generate
    /// and execute signals.
    ///
    /// Returns `None` when the scheduler or the agent is switched off.
    pub async fn tick(&mut self) -> Option<ExecutionSummary> {
        self.tick += 1;
        self.move_prices();

        let state = self.store.get();
        if !state.sched_on {
            debug!(tick = self.tick, "Scheduler off, skipping tick");
            return None;
        }

        self.supervisor.refresh_prices(&self.prices).await;
        let batch = self.supervisor.get_signals();

        if !state.agent_on {
            debug!(tick = self.tick, signals = batch.len(), "Agent off, not executing");
            return None;
        }
        if batch.is_empty() {
            return Some(ExecutionSummary::default());
        }
        Some(self.agent.execute_signals(&batch).await)
    }

    /// Backtest a registered strategy against the recorded history.
    pub fn backtest(&self, strategy: &str, symbol: &str, days: u32) -> AppResult<BacktestReport> {
        let state = self.store.get();
        let ctx = self.supervisor.context(&state);
        let history = self.supervisor.history(symbol);
        Ok(backtest(
            self.supervisor.registry(),
            strategy,
            symbol,
            &history,
            days,
            &ctx,
        )?)
    }

    /// Run until Ctrl-C.
    pub async fn run(mut self) -> AppResult<()> {
        info!(
            symbols = ?self.config.supervisor.symbols,
            tick_ms = self.config.tick_interval_ms,
            "Starting application"
        );

        let mut tick_interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        let mut stats_interval =
            tokio::time::interval(Duration::from_secs(self.config.stats_interval_secs));

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if let Some(summary) = self.tick().await {
                        if !summary.errors.is_empty() {
                            warn!(
                                tick = self.tick,
                                executed = summary.executed,
                                errors = summary.errors.len(),
                                "Signals failed"
                            );
                        }
                    }
                }

                _ = stats_interval.tick() => {
                    self.log_stats().await;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.log_stats().await;
        info!(ticks = self.tick, trades = self.agent.journal().total(), "Shutting down");
        Ok(())
    }

    async fn log_stats(&self) {
        let capital = self.agent.capital_snapshot();
        info!(
            equity = %capital.equity,
            tradable = %capital.allocation.tradable_equity,
            cap_pct = %capital.cap_pct,
            "Capital"
        );
        match self.agent.portfolio_snapshot().await {
            Ok(snapshot) => info!(
                realized_pnl = %snapshot.realized_pnl,
                unrealized_pnl = %snapshot.unrealized_pnl,
                positions = snapshot.positions.len(),
                "Portfolio"
            ),
            Err(e) => warn!(error = %e, "Portfolio snapshot failed"),
        }
    }

    /// Move every configured quote along a deterministic sine wave
    /// around its seed price.
    fn move_prices(&self) {
        let amplitude = self.config.paper.drift_pct.to_f64().unwrap_or_default();
        let phase = (self.tick as f64 * WAVE_STEP).sin();
        let Some(factor) = Decimal::from_f64(1.0 + amplitude * phase) else {
            return;
        };
        for (symbol, seed) in &self.config.paper.prices {
            let price = (*seed * factor).round_dp(8);
            self.venue.set_price(symbol, Price::new(price));
        }
    }
}
