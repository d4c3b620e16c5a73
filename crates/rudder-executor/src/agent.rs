//! Execution agent.
//!
//! Turns signals into venue orders. Every attempt ends in exactly one
//! `TradeRecord` in the journal and one audit event.
//!
//! # Pipeline (strict order)
//!
//! 1. Per-symbol lock         → one in-flight attempt per symbol
//! 2. Mode gate               → Rejected(trading_disabled)
//! 3. Price fetch             → Pending(venue_*)
//! 4. Strategy budget         → Rejected(budget_exceeded)
//! 5. Risk limits             → Rejected(leverage_limit | insufficient_equity | exposure_limit)
//! 6. set_leverage (if > 1)   → Pending(venue_*)
//! 7. place_order             → Pending(venue_*)
//! 8. Fill                    → Filled, or Pending without reason when only accepted

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rudder_core::{ClientOrderId, Price, RejectReason, Signal, TradeRecord, TradeStatus};
use rudder_position::{Portfolio, PortfolioSnapshot};
use rudder_risk::{AllocatorConfig, CapitalAllocation, CapitalAllocator, RiskLimits, RiskManager};
use rudder_state::{RuntimeState, RuntimeStateStore};
use rudder_strategy::{ExecutionMode, SignalBatch};
use rudder_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{Capability, Grants};
use crate::audit::{AuditEvent, AuditSink};
use crate::error::{AgentError, AgentResult, VenueError};
use crate::journal::TradeJournal;
use crate::venue::{call_with_timeout, DynVenue};

/// Quote asset the equity balance is expressed in.
const QUOTE_ASSET: &str = "USDT";

// ============================================================================
// Config
// ============================================================================

fn default_venue_timeout_ms() -> u64 {
    5_000
}

fn default_equity_usd() -> Decimal {
    Decimal::new(10_000, 0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on every venue call.
    #[serde(default = "default_venue_timeout_ms")]
    pub venue_timeout_ms: u64,
    /// Quote balance used when the runtime state carries no
    /// `portfolio_equity` override.
    #[serde(default = "default_equity_usd")]
    pub default_equity_usd: Decimal,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            venue_timeout_ms: default_venue_timeout_ms(),
            default_equity_usd: default_equity_usd(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.venue_timeout_ms == 0 {
            return Err("venue_timeout_ms must be > 0".to_string());
        }
        if self.default_equity_usd.is_sign_negative() {
            return Err(format!(
                "default_equity_usd must be >= 0, got {}",
                self.default_equity_usd
            ));
        }
        Ok(())
    }

    pub fn venue_timeout(&self) -> Duration {
        Duration::from_millis(self.venue_timeout_ms)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Which gate a signal goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Strategy signals; require `auto_mode`.
    Auto,
    /// Operator orders; require only `trading_on`.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalError {
    pub signal: Signal,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Signals that reached the venue and were accepted or filled.
    pub executed: usize,
    pub errors: Vec<SignalError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalSnapshot {
    pub equity: Price,
    pub cap_pct: Decimal,
    pub allocation: CapitalAllocation,
    pub reserves: BTreeMap<String, Decimal>,
}

// ============================================================================
// ExecutionAgent
// ============================================================================

pub struct ExecutionAgent {
    store: Arc<RuntimeStateStore>,
    venue: DynVenue,
    portfolio: Mutex<Portfolio>,
    journal: Arc<TradeJournal>,
    audit: Arc<dyn AuditSink>,
    /// Strategies that share capital when no spot weights are set.
    strategies: Vec<String>,
    symbol_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    config: AgentConfig,
}

impl ExecutionAgent {
    pub fn new(
        store: Arc<RuntimeStateStore>,
        venue: DynVenue,
        audit: Arc<dyn AuditSink>,
        config: AgentConfig,
    ) -> Self {
        Self {
            store,
            venue,
            portfolio: Mutex::new(Portfolio::new()),
            journal: Arc::new(TradeJournal::new()),
            audit,
            strategies: Vec::new(),
            symbol_locks: DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_strategies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strategies = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: Arc<TradeJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> &Arc<TradeJournal> {
        &self.journal
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run `f` against the portfolio under its lock.
    pub fn with_portfolio<R>(&self, f: impl FnOnce(&Portfolio) -> R) -> R {
        f(&self.portfolio.lock())
    }

    /// Execute a batch on behalf of `caller`.
    ///
    /// Fails as a whole only when the caller may not trade.
    pub async fn execute_signals_as(
        &self,
        caller: &Grants,
        batch: &SignalBatch,
    ) -> AgentResult<ExecutionSummary> {
        self.authorize(caller, "execute_signals")?;
        Ok(self.run_batch(&caller.subject, batch).await)
    }

    /// Execute a batch as the process itself.
    pub async fn execute_signals(&self, batch: &SignalBatch) -> ExecutionSummary {
        self.run_batch("system", batch).await
    }

    /// Operator order, gated by `trading_on` only.
    pub async fn place_manual_order(
        &self,
        caller: &Grants,
        signal: &Signal,
    ) -> AgentResult<TradeRecord> {
        self.authorize(caller, "place_manual_order")?;
        Ok(self
            .run_pipeline(&caller.subject, signal, AgentMode::Manual, true)
            .await)
    }

    /// Run one signal through the pipeline as the process itself.
    pub async fn execute_signal(&self, signal: &Signal, mode: AgentMode) -> TradeRecord {
        self.run_pipeline("system", signal, mode, true).await
    }

    /// Equity and budget breakdown from the current state.
    pub fn capital_snapshot(&self) -> CapitalSnapshot {
        let state = self.store.get();
        let equity = self.equity(&state);
        let allocation = self.allocator(&state).compute_budgets(
            equity,
            state.ops.capital.cap_pct,
            &state.reserves,
            &state.spot.weights,
        );
        Metrics::equity(equity.inner().to_f64().unwrap_or_default());
        CapitalSnapshot {
            equity,
            cap_pct: state.ops.capital.cap_pct,
            allocation,
            reserves: state.reserves.clone(),
        }
    }

    /// Portfolio valued against venue balances.
    pub async fn portfolio_snapshot(&self) -> AgentResult<PortfolioSnapshot> {
        let balances = call_with_timeout(
            "get_balances",
            self.config.venue_timeout(),
            self.venue.get_balances(),
        )
        .await?;
        let totals: BTreeMap<String, Decimal> = balances
            .into_iter()
            .map(|(asset, balance)| (asset, balance.total()))
            .collect();
        Ok(self.portfolio.lock().snapshot(&totals))
    }

    fn authorize(&self, caller: &Grants, action: &str) -> AgentResult<()> {
        if caller.permits(Capability::Trade) {
            return Ok(());
        }
        warn!(subject = %caller.subject, action, "Caller may not trade");
        self.audit.record(
            AuditEvent::fail(action)
                .actor(caller.subject.clone())
                .metadata(serde_json::json!({ "reason": "forbidden" })),
        );
        Err(AgentError::Forbidden {
            subject: caller.subject.clone(),
            capability: Capability::Trade,
        })
    }

    async fn run_batch(&self, actor: &str, batch: &SignalBatch) -> ExecutionSummary {
        let spot_enabled = batch.is_enabled(ExecutionMode::Spot);
        let mut summary = ExecutionSummary::default();

        for signal in &batch.signals {
            let record = self
                .run_pipeline(actor, signal, AgentMode::Auto, spot_enabled)
                .await;
            match (record.status, &record.reason) {
                (TradeStatus::Filled, _) | (TradeStatus::Pending, None) => summary.executed += 1,
                (_, reason) => summary.errors.push(SignalError {
                    signal: signal.clone(),
                    reason: reason.clone().unwrap_or_else(|| "unknown".to_string()),
                }),
            }
        }

        info!(
            signals = batch.len(),
            executed = summary.executed,
            errors = summary.errors.len(),
            "Batch executed"
        );
        summary
    }

    async fn run_pipeline(
        &self,
        actor: &str,
        signal: &Signal,
        mode: AgentMode,
        batch_enabled: bool,
    ) -> TradeRecord {
        let symbol = signal.symbol();

        // 1. One attempt per symbol at a time
        let lock = self
            .symbol_locks
            .entry(symbol.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        let cloid = ClientOrderId::new();
        let state = self.store.get();
        let last_mark = self.portfolio.lock().mark(symbol).unwrap_or(Price::ZERO);

        // 2. Mode gate
        if !batch_enabled || !gate_open(&state, mode) {
            debug!(
                symbol,
                ?mode,
                global_stop = state.global_stop,
                trading_on = state.trading_on,
                auto_mode = state.auto_mode,
                batch_enabled,
                "Gate: trading disabled"
            );
            let record =
                TradeRecord::rejected(cloid, signal, last_mark, RejectReason::TradingDisabled);
            return self.finish(actor, record);
        }

        // 3. Price
        let timeout = self.config.venue_timeout();
        let price = match call_with_timeout("get_price", timeout, self.venue.get_price(symbol))
            .await
            .and_then(|p| {
                if p.is_positive() {
                    Ok(p)
                } else {
                    Err(VenueError::Malformed(format!("non-positive price {p}")))
                }
            }) {
            Ok(price) => price,
            Err(e) => {
                let record = TradeRecord::pending(cloid, signal, last_mark, Some(e.code().into()));
                return self.finish(actor, record);
            }
        };

        let equity = {
            let mut portfolio = self.portfolio.lock();
            portfolio.update_mark(symbol, price);
            portfolio.equity_usd(&self.quote_balances(&state))
        };

        // 4. Budget
        let Some(notional) = signal.notional(price) else {
            debug!(symbol, price = %price, "Gate: notional overflow");
            let record = TradeRecord::rejected(cloid, signal, price, RejectReason::BudgetExceeded);
            return self.finish(actor, record);
        };
        let allocator = self.allocator(&state);
        let allocation = allocator.compute_budgets(
            equity,
            state.ops.capital.cap_pct,
            &state.reserves,
            &state.spot.weights,
        );
        let budget = match signal.strategy() {
            Some(tag) => allocation.budget_for(tag),
            None => allocation
                .tradable_equity
                .min(allocator.max_order_notional(equity)),
        };
        if notional > budget {
            debug!(
                symbol,
                strategy = signal.strategy().unwrap_or("-"),
                notional = %notional,
                budget = %budget,
                "Gate: budget exceeded"
            );
            let record = TradeRecord::rejected(cloid, signal, price, RejectReason::BudgetExceeded);
            return self.finish(actor, record);
        }

        // 5. Risk
        let verdict = RiskManager::new(RiskLimits::from_state(&state)).validate_order(
            equity,
            notional,
            signal.leverage(),
        );
        if let Err(reason) = verdict.into_result() {
            let record = TradeRecord::rejected(cloid, signal, price, reason);
            return self.finish(actor, record);
        }

        // 6. Leverage
        if signal.leverage() > Decimal::ONE {
            if let Err(e) = call_with_timeout(
                "set_leverage",
                timeout,
                self.venue.set_leverage(symbol, signal.leverage()),
            )
            .await
            {
                let record = TradeRecord::pending(cloid, signal, price, Some(e.code().into()));
                return self.finish(actor, record);
            }
        }

        // 7. Submit
        Metrics::order_submitted(symbol, signal.side().as_str());
        let ack = match call_with_timeout(
            "place_order",
            timeout,
            self.venue.place_order(
                symbol,
                signal.side(),
                signal.quantity(),
                signal.order_type(),
            ),
        )
        .await
        {
            Ok(ack) => ack,
            Err(e) => {
                let record = TradeRecord::pending(cloid, signal, price, Some(e.code().into()));
                return self.finish(actor, record);
            }
        };

        // 8. Record
        if !ack.has_fill() {
            let record = TradeRecord::pending(cloid, signal, price, None)
                .with_venue_response(ack.order_id, ack.raw);
            return self.finish(actor, record);
        }

        let fill_price = ack.avg_price.unwrap_or(price);
        let applied = self.portfolio.lock().apply_fill(
            symbol,
            signal.side(),
            ack.filled_qty,
            fill_price,
        );
        let record = match applied {
            Ok(outcome) => {
                debug!(
                    symbol,
                    realized_pnl = %outcome.realized_pnl,
                    "Fill applied"
                );
                TradeRecord::filled(
                    cloid,
                    signal,
                    ack.filled_qty,
                    fill_price,
                    ack.order_id,
                    ack.raw,
                )
            }
            Err(e) => {
                warn!(symbol, error = %e, "Venue fill not applied to portfolio");
                TradeRecord::pending(cloid, signal, fill_price, Some("invalid_fill".into()))
                    .with_venue_response(ack.order_id, ack.raw)
            }
        };
        self.finish(actor, record)
    }

    /// Journal, count and audit one attempt.
    fn finish(&self, actor: &str, record: TradeRecord) -> TradeRecord {
        Metrics::trade_recorded(record.status.as_str());
        if let (TradeStatus::Rejected, Some(reason)) = (record.status, &record.reason) {
            Metrics::order_rejected(reason);
        }

        let event = match (record.status, &record.reason) {
            (TradeStatus::Filled, _) | (TradeStatus::Pending, None) => {
                AuditEvent::ok("execute_signal")
            }
            _ => AuditEvent::fail("execute_signal"),
        };
        self.audit.record(
            event
                .actor(actor)
                .target(record.symbol.clone())
                .metadata(serde_json::to_value(&record).unwrap_or_default()),
        );

        info!(
            cloid = %record.client_order_id,
            symbol = %record.symbol,
            side = %record.side,
            qty = %record.qty,
            price = %record.price,
            status = record.status.as_str(),
            reason = record.reason.as_deref().unwrap_or("-"),
            "Trade recorded"
        );
        self.journal.append(record.clone());
        record
    }

    fn quote_balances(&self, state: &RuntimeState) -> BTreeMap<String, Decimal> {
        let quote = state
            .portfolio_equity
            .unwrap_or(self.config.default_equity_usd);
        BTreeMap::from([(QUOTE_ASSET.to_string(), quote)])
    }

    fn equity(&self, state: &RuntimeState) -> Price {
        self.portfolio
            .lock()
            .equity_usd(&self.quote_balances(state))
    }

    fn allocator(&self, state: &RuntimeState) -> CapitalAllocator {
        CapitalAllocator::new(AllocatorConfig::from_spot(&state.spot))
            .with_strategies(self.strategies.iter().cloned())
    }
}

fn gate_open(state: &RuntimeState, mode: AgentMode) -> bool {
    if state.global_stop || !state.trading_on {
        return false;
    }
    match mode {
        AgentMode::Auto => state.auto_mode,
        AgentMode::Manual => true,
    }
}
