//! Application configuration.
//!
//! Loaded from a TOML file. Runtime flags and capital policy come from
//! `StartupOptions` (environment), not from here.

use std::collections::BTreeMap;
use std::path::Path;

use rudder_executor::AgentConfig;
use rudder_strategy::SupervisorConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_stats_interval_secs() -> u64 {
    60
}

fn default_drift_pct() -> Decimal {
    Decimal::new(5, 3)
}

fn default_balances() -> BTreeMap<String, Decimal> {
    BTreeMap::from([("USDT".to_string(), Decimal::new(10_000, 0))])
}

/// Paper venue seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Starting quote per symbol.
    #[serde(default)]
    pub prices: BTreeMap<String, Decimal>,
    /// Asset balances reported by the venue.
    #[serde(default = "default_balances")]
    pub balances: BTreeMap<String, Decimal>,
    /// Amplitude of the synthetic price wave, as a fraction.
    #[serde(default = "default_drift_pct")]
    pub drift_pct: Decimal,
    /// Simulated latency per venue call.
    #[serde(default)]
    pub latency_ms: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            prices: BTreeMap::new(),
            balances: default_balances(),
            drift_pct: default_drift_pct(),
            latency_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often capital and journal stats are logged.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    /// Optional file layered under the `RUDDER_` environment for
    /// start-up options.
    #[serde(default)]
    pub options_file: Option<String>,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            stats_interval_secs: default_stats_interval_secs(),
            options_file: None,
            supervisor: SupervisorConfig::default(),
            agent: AgentConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate().map_err(AppError::Config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be > 0".to_string());
        }
        if self.stats_interval_secs == 0 {
            return Err("stats_interval_secs must be > 0".to_string());
        }
        self.supervisor.validate()?;
        self.agent.validate()?;
        for symbol in &self.supervisor.symbols {
            match self.paper.prices.get(symbol) {
                Some(price) if price.is_sign_positive() && !price.is_zero() => {}
                Some(price) => {
                    return Err(format!("paper price for {symbol} must be > 0, got {price}"))
                }
                None => return Err(format!("no paper price for symbol {symbol}")),
            }
        }
        if self.paper.drift_pct.is_sign_negative() || self.paper.drift_pct >= Decimal::ONE {
            return Err(format!(
                "paper.drift_pct must be in [0, 1), got {}",
                self.paper.drift_pct
            ));
        }
        Ok(())
    }
}
