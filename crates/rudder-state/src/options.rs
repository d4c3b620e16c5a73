//! Start-up options.
//!
//! Read once at process start from an optional file and `RUDDER_*`
//! environment variables, then turned into the initial `RuntimeState`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::state::{
    ArbConfig, CapitalConfig, OpsConfig, RuntimeState, ScalpConfig, SpotConfig,
};

const ENV_PREFIX: &str = "RUDDER";

/// Flat option set as it appears in the environment.
///
/// Numbers arrive as floats and are checked for finiteness before
/// becoming `Decimal`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawOptions {
    auto_mode: bool,
    global_stop: bool,
    trading_on: bool,
    agent_on: bool,
    arb_on: bool,
    sched_on: bool,
    manual_override: bool,
    spot_enabled: bool,
    cap_pct: f64,
    hard_max_pct: f64,
    max_trade_pct: f64,
    risk_per_trade_pct: f64,
    max_symbol_exposure_pct: f64,
    max_positions: u32,
    tp_pct_default: f64,
    sl_pct_default: f64,
    max_leverage: f64,
    reserve_portfolio: f64,
    reserve_arbitrage: f64,
    portfolio_equity: Option<f64>,
}

impl Default for RawOptions {
    fn default() -> Self {
        Self {
            auto_mode: false,
            global_stop: false,
            trading_on: true,
            agent_on: true,
            arb_on: false,
            sched_on: true,
            manual_override: false,
            spot_enabled: true,
            cap_pct: 0.25,
            hard_max_pct: 1.0,
            max_trade_pct: 0.20,
            risk_per_trade_pct: 0.005,
            max_symbol_exposure_pct: 0.35,
            max_positions: 5,
            tp_pct_default: 0.30,
            sl_pct_default: 0.15,
            max_leverage: 20.0,
            reserve_portfolio: 0.0,
            reserve_arbitrage: 0.0,
            portfolio_equity: None,
        }
    }
}

/// Validated start-up options.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupOptions {
    pub auto_mode: bool,
    pub global_stop: bool,
    pub trading_on: bool,
    pub agent_on: bool,
    pub arb_on: bool,
    pub sched_on: bool,
    pub manual_override: bool,
    pub spot_enabled: bool,
    pub cap_pct: Decimal,
    pub hard_max_pct: Decimal,
    pub max_trade_pct: Decimal,
    pub risk_per_trade_pct: Decimal,
    pub max_symbol_exposure_pct: Decimal,
    pub max_positions: u32,
    pub tp_pct_default: Decimal,
    pub sl_pct_default: Decimal,
    pub max_leverage: Decimal,
    pub reserve_portfolio: Decimal,
    pub reserve_arbitrage: Decimal,
    pub portfolio_equity: Option<Decimal>,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            auto_mode: false,
            global_stop: false,
            trading_on: true,
            agent_on: true,
            arb_on: false,
            sched_on: true,
            manual_override: false,
            spot_enabled: true,
            cap_pct: Decimal::new(25, 2),
            hard_max_pct: Decimal::ONE,
            max_trade_pct: Decimal::new(20, 2),
            risk_per_trade_pct: Decimal::new(5, 3),
            max_symbol_exposure_pct: Decimal::new(35, 2),
            max_positions: 5,
            tp_pct_default: Decimal::new(30, 2),
            sl_pct_default: Decimal::new(15, 2),
            max_leverage: Decimal::from(20),
            reserve_portfolio: Decimal::ZERO,
            reserve_arbitrage: Decimal::ZERO,
            portfolio_equity: None,
        }
    }
}

fn to_decimal(name: &str, value: f64) -> StateResult<Decimal> {
    if !value.is_finite() {
        return Err(StateError::Config(format!(
            "{ENV_PREFIX}_{} must be a finite number, got {value}",
            name.to_ascii_uppercase()
        )));
    }
    Decimal::from_str(&value.to_string()).map_err(|e| {
        StateError::Config(format!(
            "{ENV_PREFIX}_{} out of range ({value}): {e}",
            name.to_ascii_uppercase()
        ))
    })
}

impl TryFrom<RawOptions> for StartupOptions {
    type Error = StateError;

    fn try_from(raw: RawOptions) -> StateResult<Self> {
        Ok(Self {
            auto_mode: raw.auto_mode,
            global_stop: raw.global_stop,
            trading_on: raw.trading_on,
            agent_on: raw.agent_on,
            arb_on: raw.arb_on,
            sched_on: raw.sched_on,
            manual_override: raw.manual_override,
            spot_enabled: raw.spot_enabled,
            cap_pct: to_decimal("cap_pct", raw.cap_pct)?,
            hard_max_pct: to_decimal("hard_max_pct", raw.hard_max_pct)?,
            max_trade_pct: to_decimal("max_trade_pct", raw.max_trade_pct)?,
            risk_per_trade_pct: to_decimal("risk_per_trade_pct", raw.risk_per_trade_pct)?,
            max_symbol_exposure_pct: to_decimal(
                "max_symbol_exposure_pct",
                raw.max_symbol_exposure_pct,
            )?,
            max_positions: raw.max_positions,
            tp_pct_default: to_decimal("tp_pct_default", raw.tp_pct_default)?,
            sl_pct_default: to_decimal("sl_pct_default", raw.sl_pct_default)?,
            max_leverage: to_decimal("max_leverage", raw.max_leverage)?,
            reserve_portfolio: to_decimal("reserve_portfolio", raw.reserve_portfolio)?,
            reserve_arbitrage: to_decimal("reserve_arbitrage", raw.reserve_arbitrage)?,
            portfolio_equity: raw
                .portfolio_equity
                .map(|v| to_decimal("portfolio_equity", v))
                .transpose()?,
        })
    }
}

impl StartupOptions {
    /// Load from the process environment only.
    pub fn load() -> StateResult<Self> {
        Self::load_with(None, None)
    }

    /// Load from an optional file, then the environment.
    ///
    /// `env` replaces the process environment when given; tests use it
    /// to avoid touching global state.
    pub fn load_with(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> StateResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let raw: RawOptions = builder.build()?.try_deserialize()?;
        let options = Self::try_from(raw)?;
        debug!(?options, "Loaded start-up options");
        Ok(options)
    }
}

impl From<StartupOptions> for RuntimeState {
    fn from(opts: StartupOptions) -> Self {
        let mut reserves = BTreeMap::new();
        reserves.insert("portfolio".to_string(), opts.reserve_portfolio);
        reserves.insert("arbitrage".to_string(), opts.reserve_arbitrage);

        Self {
            auto_mode: opts.auto_mode,
            global_stop: opts.global_stop,
            trading_on: opts.trading_on,
            agent_on: opts.agent_on,
            arb_on: opts.arb_on,
            sched_on: opts.sched_on,
            manual_override: opts.manual_override,
            manual_strategy: None,
            scalp: ScalpConfig {
                tp_pct: opts.tp_pct_default,
                sl_pct: opts.sl_pct_default,
                ..ScalpConfig::default()
            },
            arb: ArbConfig::default(),
            spot: SpotConfig {
                enabled: opts.spot_enabled,
                weights: BTreeMap::new(),
                max_positions: opts.max_positions,
                max_trade_pct: opts.max_trade_pct,
                risk_per_trade_pct: opts.risk_per_trade_pct,
                max_symbol_exposure_pct: opts.max_symbol_exposure_pct,
                tp_pct_default: opts.tp_pct_default,
                sl_pct_default: opts.sl_pct_default,
            },
            reserves,
            ops: OpsConfig {
                capital: CapitalConfig {
                    cap_pct: opts.cap_pct,
                    hard_max_pct: opts.hard_max_pct,
                },
                max_leverage: opts.max_leverage,
            },
            portfolio_equity: opts.portfolio_equity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_env() {
        let opts = StartupOptions::load_with(None, env(&[])).unwrap();
        assert_eq!(opts, StartupOptions::default());
        assert!(opts.trading_on);
        assert!(!opts.auto_mode);
        assert_eq!(opts.cap_pct, dec!(0.25));
        assert_eq!(opts.max_trade_pct, dec!(0.2));
        assert_eq!(opts.max_leverage, dec!(20));
        assert!(opts.portfolio_equity.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let opts = StartupOptions::load_with(
            None,
            env(&[
                ("RUDDER_AUTO_MODE", "true"),
                ("RUDDER_CAP_PCT", "0.5"),
                ("RUDDER_MAX_POSITIONS", "3"),
                ("RUDDER_RESERVE_ARBITRAGE", "500"),
                ("RUDDER_PORTFOLIO_EQUITY", "10000"),
            ]),
        )
        .unwrap();
        assert!(opts.auto_mode);
        assert_eq!(opts.cap_pct, dec!(0.5));
        assert_eq!(opts.max_positions, 3);
        assert_eq!(opts.reserve_arbitrage, dec!(500));
        assert_eq!(opts.portfolio_equity, Some(dec!(10000)));
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let err = StartupOptions::load_with(None, env(&[("RUDDER_CAP_PCT", "lots")]))
            .unwrap_err();
        assert!(matches!(err, StateError::Config(_)));
    }

    #[test]
    fn test_non_finite_number_is_config_error() {
        let err = StartupOptions::load_with(None, env(&[("RUDDER_MAX_LEVERAGE", "inf")]))
            .unwrap_err();
        assert!(matches!(err, StateError::Config(_)));
    }

    #[test]
    fn test_into_runtime_state() {
        let opts = StartupOptions {
            reserve_arbitrage: dec!(500),
            global_stop: true,
            ..StartupOptions::default()
        };
        let state = RuntimeState::from(opts);
        assert!(state.global_stop);
        assert_eq!(state.reserves["arbitrage"], dec!(500));
        assert_eq!(state.ops.capital.cap_pct, dec!(0.25));
        assert_eq!(state.spot.sl_pct_default, dec!(0.15));
    }

    #[test]
    fn test_default_options_match_default_state() {
        assert_eq!(
            RuntimeState::from(StartupOptions::default()),
            RuntimeState::default()
        );
    }
}
