//! Trade signals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::order::{OrderSide, OrderType};
use crate::{Price, Size};

/// A proposed trade action, not yet risk- or budget-checked.
///
/// Immutable once produced: fields are only reachable through accessors
/// and the `with_*` builders consume the signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignalWire")]
pub struct Signal {
    symbol: String,
    side: OrderSide,
    quantity: Size,
    strategy: Option<String>,
    confidence: Option<Decimal>,
    leverage: Decimal,
    order_type: OrderType,
}

/// Inbound wire form, validated through `Signal::new`.
#[derive(Deserialize)]
struct SignalWire {
    symbol: String,
    side: OrderSide,
    quantity: Size,
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    confidence: Option<Decimal>,
    #[serde(default = "default_leverage")]
    leverage: Decimal,
    #[serde(default)]
    order_type: OrderType,
}

impl TryFrom<SignalWire> for Signal {
    type Error = CoreError;

    fn try_from(wire: SignalWire) -> Result<Self> {
        let mut signal = Signal::new(wire.symbol, wire.side, wire.quantity)?;
        signal.strategy = wire.strategy;
        signal.confidence = wire.confidence;
        signal.order_type = wire.order_type;
        signal.with_leverage(wire.leverage)
    }
}

fn default_leverage() -> Decimal {
    Decimal::ONE
}

impl Signal {
    /// Create a signal. The symbol is upper-cased; quantity must be positive.
    pub fn new(symbol: impl AsRef<str>, side: OrderSide, quantity: Size) -> Result<Self> {
        let symbol = symbol.as_ref().trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(CoreError::InvalidSymbol(symbol));
        }
        if !quantity.is_positive() {
            return Err(CoreError::InvalidSize(format!(
                "signal quantity must be positive, got {quantity}"
            )));
        }
        Ok(Self {
            symbol,
            side,
            quantity,
            strategy: None,
            confidence: None,
            leverage: default_leverage(),
            order_type: OrderType::default(),
        })
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set leverage. Must be positive.
    pub fn with_leverage(mut self, leverage: Decimal) -> Result<Self> {
        if leverage <= Decimal::ZERO {
            return Err(CoreError::InvalidLeverage(leverage.to_string()));
        }
        self.leverage = leverage;
        Ok(self)
    }

    #[must_use]
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn quantity(&self) -> Size {
        self.quantity
    }

    pub fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    pub fn confidence(&self) -> Option<Decimal> {
        self.confidence
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Notional value of the signal at `price`; `None` on overflow.
    pub fn notional(&self, price: Price) -> Option<Price> {
        self.quantity.notional(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_normalizes_symbol() {
        let signal = Signal::new(" btcusdt", OrderSide::Buy, Size::new(dec!(1))).unwrap();
        assert_eq!(signal.symbol(), "BTCUSDT");
        assert_eq!(signal.leverage(), dec!(1));
        assert_eq!(signal.order_type(), OrderType::Market);
    }

    #[test]
    fn test_signal_rejects_non_positive_quantity() {
        assert!(Signal::new("BTCUSDT", OrderSide::Buy, Size::ZERO).is_err());
        assert!(Signal::new("BTCUSDT", OrderSide::Sell, Size::new(dec!(-1))).is_err());
        assert!(Signal::new("", OrderSide::Sell, Size::new(dec!(1))).is_err());
    }

    #[test]
    fn test_signal_deserializes_with_defaults() {
        let json = r#"{"symbol":"ETHUSDT","side":"SELL","quantity":"0.5"}"#;
        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.side(), OrderSide::Sell);
        assert_eq!(signal.leverage(), dec!(1));
        assert!(signal.strategy().is_none());
    }

    #[test]
    fn test_signal_deserialize_validates_quantity() {
        let json = r#"{"symbol":"ETHUSDT","side":"BUY","quantity":"0"}"#;
        assert!(serde_json::from_str::<Signal>(json).is_err());
    }

    #[test]
    fn test_signal_notional() {
        let signal = Signal::new("ETHUSDT", OrderSide::Buy, Size::new(dec!(1.5)))
            .unwrap()
            .with_strategy("trend_follow");
        assert_eq!(
            signal.notional(Price::new(dec!(100))),
            Some(Price::new(dec!(150)))
        );
        assert_eq!(signal.strategy(), Some("trend_follow"));
    }

    #[test]
    fn test_signal_rejects_non_positive_leverage() {
        let signal = Signal::new("ETHUSDT", OrderSide::Buy, Size::new(dec!(1))).unwrap();
        assert!(signal.clone().with_leverage(dec!(0)).is_err());
        assert!(signal.clone().with_leverage(dec!(-2)).is_err());
        assert_eq!(signal.with_leverage(dec!(3)).unwrap().leverage(), dec!(3));

        let json = r#"{"symbol":"ETHUSDT","side":"BUY","quantity":"1","leverage":"0"}"#;
        assert!(serde_json::from_str::<Signal>(json).is_err());
    }
}
