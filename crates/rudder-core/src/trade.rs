//! Trade records and rejection reasons.
//!
//! A `TradeRecord` is appended for every execution attempt, including
//! rejected ones, so the journal is a complete account of what the
//! execution agent decided.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::order::{ClientOrderId, OrderSide};
use crate::signal::Signal;
use crate::{Price, Size};

// ============================================================================
// RejectReason
// ============================================================================

/// Which stage of the pipeline produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Operating-mode or budget gate.
    Gate,
    /// Risk limit.
    Risk,
}

/// Reason for rejecting a signal before it reaches the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Global stop set, or the mode flag for this execution path is off.
    TradingDisabled,
    /// Signal notional exceeds its strategy's budget.
    BudgetExceeded,
    /// Requested leverage above the configured ceiling.
    LeverageLimit,
    /// Order value too large relative to equity.
    ExposureLimit,
    /// Equity is zero or negative.
    InsufficientEquity,
}

impl RejectReason {
    /// Machine-readable reason code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TradingDisabled => "trading_disabled",
            Self::BudgetExceeded => "budget_exceeded",
            Self::LeverageLimit => "leverage_limit",
            Self::ExposureLimit => "exposure_limit",
            Self::InsufficientEquity => "insufficient_equity",
        }
    }

    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::TradingDisabled | Self::BudgetExceeded => RejectionKind::Gate,
            Self::LeverageLimit | Self::ExposureLimit | Self::InsufficientEquity => {
                RejectionKind::Risk
            }
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TradeRecord
// ============================================================================

/// Outcome status of an execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    /// Submitted but not confirmed filled (includes venue failures).
    Pending,
    /// Fill confirmed by the venue.
    Filled,
    /// Rejected by a gate or risk check; the venue was not called.
    Rejected,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Filled => "FILLED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// One execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub client_order_id: ClientOrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: Size,
    /// Price snapshot used for the decision, or the fill price when filled.
    pub price: Price,
    pub leverage: Decimal,
    pub status: TradeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_response: Option<serde_json::Value>,
}

impl TradeRecord {
    fn from_signal(
        cloid: ClientOrderId,
        signal: &Signal,
        price: Price,
        status: TradeStatus,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            client_order_id: cloid,
            symbol: signal.symbol().to_string(),
            side: signal.side(),
            qty: signal.quantity(),
            price,
            leverage: signal.leverage(),
            status,
            reason: None,
            strategy: signal.strategy().map(str::to_string),
            order_id: None,
            venue_response: None,
        }
    }

    /// Record for a signal stopped at a gate or risk check.
    #[must_use]
    pub fn rejected(
        cloid: ClientOrderId,
        signal: &Signal,
        price: Price,
        reason: RejectReason,
    ) -> Self {
        let mut record = Self::from_signal(cloid, signal, price, TradeStatus::Rejected);
        record.reason = Some(reason.as_str().to_string());
        record
    }

    /// Record for a confirmed fill of `filled_qty` at `fill_price`.
    #[must_use]
    pub fn filled(
        cloid: ClientOrderId,
        signal: &Signal,
        filled_qty: Size,
        fill_price: Price,
        order_id: String,
        venue_response: serde_json::Value,
    ) -> Self {
        let mut record = Self::from_signal(cloid, signal, fill_price, TradeStatus::Filled);
        record.qty = filled_qty;
        record.order_id = Some(order_id);
        record.venue_response = Some(venue_response);
        record
    }

    /// Record for an order accepted by the venue without a confirmed fill,
    /// or for a venue failure when `reason` is set.
    #[must_use]
    pub fn pending(
        cloid: ClientOrderId,
        signal: &Signal,
        price: Price,
        reason: Option<String>,
    ) -> Self {
        let mut record = Self::from_signal(cloid, signal, price, TradeStatus::Pending);
        record.reason = reason;
        record
    }

    #[must_use]
    pub fn with_venue_response(mut self, order_id: String, response: serde_json::Value) -> Self {
        self.order_id = Some(order_id);
        self.venue_response = Some(response);
        self
    }

    pub fn is_rejected(&self) -> bool {
        self.status == TradeStatus::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_signal() -> Signal {
        Signal::new("BTCUSDT", OrderSide::Buy, Size::new(dec!(2)))
            .unwrap()
            .with_strategy("scalping_breakout")
    }

    #[test]
    fn test_reject_reason_codes() {
        assert_eq!(RejectReason::TradingDisabled.as_str(), "trading_disabled");
        assert_eq!(RejectReason::BudgetExceeded.kind(), RejectionKind::Gate);
        assert_eq!(RejectReason::ExposureLimit.kind(), RejectionKind::Risk);
    }

    #[test]
    fn test_rejected_record_carries_reason() {
        let record = TradeRecord::rejected(
            ClientOrderId::new(),
            &sample_signal(),
            Price::new(dec!(100)),
            RejectReason::BudgetExceeded,
        );
        assert_eq!(record.status, TradeStatus::Rejected);
        assert_eq!(record.reason.as_deref(), Some("budget_exceeded"));
        assert_eq!(record.strategy.as_deref(), Some("scalping_breakout"));
        assert!(record.order_id.is_none());
    }

    #[test]
    fn test_filled_record_uses_fill_values() {
        let record = TradeRecord::filled(
            ClientOrderId::new(),
            &sample_signal(),
            Size::new(dec!(1)),
            Price::new(dec!(101)),
            "42".to_string(),
            serde_json::json!({"status": "FILLED"}),
        );
        assert_eq!(record.status, TradeStatus::Filled);
        assert_eq!(record.qty, Size::new(dec!(1)));
        assert_eq!(record.price, Price::new(dec!(101)));
        assert_eq!(record.order_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&TradeStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }
}
