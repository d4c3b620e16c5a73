//! Order-level risk validation.

use rudder_core::{Price, RejectReason};
use rudder_state::RuntimeState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RiskError, RiskResult};

/// Risk ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_leverage: Decimal,
    /// Largest order value as a fraction of equity.
    pub max_symbol_exposure: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_leverage: Decimal::from(20),
            max_symbol_exposure: Decimal::new(35, 2),
        }
    }
}

impl RiskLimits {
    pub fn from_state(state: &RuntimeState) -> Self {
        Self {
            max_leverage: state.ops.max_leverage,
            max_symbol_exposure: state.spot.max_symbol_exposure_pct,
        }
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.max_leverage <= Decimal::ZERO {
            return Err(RiskError::ConfigError(format!(
                "max_leverage ({}) must be positive",
                self.max_leverage
            )));
        }
        if self.max_symbol_exposure <= Decimal::ZERO {
            return Err(RiskError::ConfigError(format!(
                "max_symbol_exposure ({}) must be positive",
                self.max_symbol_exposure
            )));
        }
        Ok(())
    }
}

/// Outcome of a risk check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl RiskVerdict {
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn reject(reason: RejectReason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn into_result(self) -> Result<(), RejectReason> {
        match self.reason {
            Some(reason) if !self.ok => Err(reason),
            _ => Ok(()),
        }
    }
}

/// Stateless order validator.
#[derive(Debug, Clone, Default)]
pub struct RiskManager {
    limits: RiskLimits,
}

impl RiskManager {
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Check an order against the limits.
    ///
    /// Checks run in a fixed order: leverage, then equity, then exposure.
    /// Equity is checked before the ratio so the ratio never divides by
    /// zero.
    pub fn validate_order(
        &self,
        equity_usd: Price,
        order_value_usd: Price,
        leverage: Decimal,
    ) -> RiskVerdict {
        if leverage > self.limits.max_leverage {
            debug!(
                leverage = %leverage,
                max = %self.limits.max_leverage,
                "Risk: leverage above limit"
            );
            return RiskVerdict::reject(RejectReason::LeverageLimit);
        }

        if !equity_usd.is_positive() {
            debug!(equity = %equity_usd, "Risk: no equity");
            return RiskVerdict::reject(RejectReason::InsufficientEquity);
        }

        // A ratio too large for `Decimal` is over any limit.
        let Some(exposure) = order_value_usd.inner().checked_div(equity_usd.inner()) else {
            debug!(
                order_value = %order_value_usd,
                equity = %equity_usd,
                "Risk: exposure overflows"
            );
            return RiskVerdict::reject(RejectReason::ExposureLimit);
        };
        if exposure > self.limits.max_symbol_exposure {
            debug!(
                order_value = %order_value_usd,
                equity = %equity_usd,
                exposure = %exposure,
                max = %self.limits.max_symbol_exposure,
                "Risk: exposure above limit"
            );
            return RiskVerdict::reject(RejectReason::ExposureLimit);
        }

        RiskVerdict::pass()
    }
}
