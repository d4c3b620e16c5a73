//! In-process paper venue.
//!
//! Quotes configured prices and fills market orders immediately at the
//! quote. Balances are static: fills are tracked by the agent's
//! portfolio, not here. Failure injection and the call log make it the
//! venue used by tests as well as by the paper-trading binary.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rudder_core::{OrderSide, OrderType, Price, Size};
use rudder_strategy::BoxFuture;
use rust_decimal::Decimal;
use serde_json::json;

use crate::error::{VenueError, VenueResult};
use crate::venue::{AckStatus, Balance, OrderAck, Venue};

/// Venue operation, for failure injection and the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VenueOp {
    GetPrice,
    GetBalances,
    PlaceOrder,
    SetLeverage,
}

/// One recorded venue call.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueCall {
    GetPrice {
        symbol: String,
    },
    GetBalances,
    PlaceOrder {
        symbol: String,
        side: OrderSide,
        qty: Size,
        order_type: OrderType,
    },
    SetLeverage {
        symbol: String,
        leverage: Decimal,
    },
}

impl VenueCall {
    pub fn op(&self) -> VenueOp {
        match self {
            Self::GetPrice { .. } => VenueOp::GetPrice,
            Self::GetBalances => VenueOp::GetBalances,
            Self::PlaceOrder { .. } => VenueOp::PlaceOrder,
            Self::SetLeverage { .. } => VenueOp::SetLeverage,
        }
    }
}

#[derive(Debug, Default)]
struct InFlight {
    current: HashMap<String, usize>,
    max: HashMap<String, usize>,
}

pub struct PaperVenue {
    prices: Mutex<HashMap<String, Price>>,
    balances: Mutex<BTreeMap<String, Balance>>,
    fail_next: Mutex<HashMap<VenueOp, VenueError>>,
    fail_symbols: Mutex<HashMap<String, VenueError>>,
    calls: Mutex<Vec<VenueCall>>,
    in_flight: Mutex<InFlight>,
    latency: Mutex<Duration>,
    accept_only: AtomicBool,
    order_seq: AtomicU64,
}

impl Default for PaperVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperVenue {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            balances: Mutex::new(BTreeMap::new()),
            fail_next: Mutex::new(HashMap::new()),
            fail_symbols: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: Mutex::new(InFlight::default()),
            latency: Mutex::new(Duration::ZERO),
            accept_only: AtomicBool::new(false),
            order_seq: AtomicU64::new(0),
        }
    }

    pub fn set_price(&self, symbol: &str, price: Price) {
        self.prices.lock().insert(symbol.to_string(), price);
    }

    pub fn price(&self, symbol: &str) -> Option<Price> {
        self.prices.lock().get(symbol).copied()
    }

    pub fn set_balance(&self, asset: &str, balance: Balance) {
        self.balances.lock().insert(asset.to_string(), balance);
    }

    /// Fail the next call of `op` with `error`.
    pub fn fail_next(&self, op: VenueOp, error: VenueError) {
        self.fail_next.lock().insert(op, error);
    }

    /// Fail every order for `symbol` until cleared.
    pub fn fail_orders_for(&self, symbol: &str, error: VenueError) {
        self.fail_symbols.lock().insert(symbol.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.fail_next.lock().clear();
        self.fail_symbols.lock().clear();
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Acknowledge orders without filling them.
    pub fn set_accept_only(&self, accept_only: bool) {
        self.accept_only.store(accept_only, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<VenueCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, op: VenueOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Highest number of concurrent orders seen for `symbol`.
    pub fn max_in_flight(&self, symbol: &str) -> usize {
        self.in_flight.lock().max.get(symbol).copied().unwrap_or(0)
    }

    fn record(&self, call: VenueCall) -> VenueResult<()> {
        let op = call.op();
        self.calls.lock().push(call);
        match self.fail_next.lock().remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn enter(&self, symbol: &str) -> InFlightGuard<'_> {
        let mut in_flight = self.in_flight.lock();
        let current = in_flight.current.entry(symbol.to_string()).or_insert(0);
        *current += 1;
        let now = *current;
        let max = in_flight.max.entry(symbol.to_string()).or_insert(0);
        *max = (*max).max(now);
        InFlightGuard {
            venue: self,
            symbol: symbol.to_string(),
        }
    }
}

struct InFlightGuard<'a> {
    venue: &'a PaperVenue,
    symbol: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.venue.in_flight.lock();
        if let Some(current) = in_flight.current.get_mut(&self.symbol) {
            *current = current.saturating_sub(1);
        }
    }
}

impl Venue for PaperVenue {
    fn name(&self) -> &str {
        "paper"
    }

    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>> {
        Box::pin(async move {
            self.record(VenueCall::GetPrice {
                symbol: symbol.to_string(),
            })?;
            self.delay().await;
            self.price(symbol)
                .ok_or_else(|| VenueError::Unavailable(format!("no quote for {symbol}")))
        })
    }

    fn get_balances(&self) -> BoxFuture<'_, VenueResult<BTreeMap<String, Balance>>> {
        Box::pin(async move {
            self.record(VenueCall::GetBalances)?;
            self.delay().await;
            Ok(self.balances.lock().clone())
        })
    }

    fn place_order<'a>(
        &'a self,
        symbol: &'a str,
        side: OrderSide,
        qty: Size,
        order_type: OrderType,
    ) -> BoxFuture<'a, VenueResult<OrderAck>> {
        Box::pin(async move {
            let _guard = self.enter(symbol);
            self.record(VenueCall::PlaceOrder {
                symbol: symbol.to_string(),
                side,
                qty,
                order_type,
            })?;
            self.delay().await;

            if let Some(err) = self.fail_symbols.lock().get(symbol).cloned() {
                return Err(err);
            }
            if !qty.is_positive() {
                return Err(VenueError::Rejected(format!("non-positive quantity {qty}")));
            }
            let price = self
                .price(symbol)
                .ok_or_else(|| VenueError::Rejected(format!("unknown symbol {symbol}")))?;

            let seq = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let order_id = format!("paper-{seq}");

            if self.accept_only.load(Ordering::SeqCst) {
                return Ok(OrderAck {
                    raw: json!({
                        "orderId": order_id,
                        "symbol": symbol,
                        "side": side.as_str(),
                        "status": "NEW",
                        "origQty": qty.to_string(),
                        "executedQty": "0",
                    }),
                    order_id,
                    status: AckStatus::Accepted,
                    filled_qty: Size::ZERO,
                    avg_price: None,
                });
            }

            Ok(OrderAck {
                raw: json!({
                    "orderId": order_id,
                    "symbol": symbol,
                    "side": side.as_str(),
                    "status": "FILLED",
                    "origQty": qty.to_string(),
                    "executedQty": qty.to_string(),
                    "avgPrice": price.to_string(),
                }),
                order_id,
                status: AckStatus::Filled,
                filled_qty: qty,
                avg_price: Some(price),
            })
        })
    }

    fn set_leverage<'a>(
        &'a self,
        symbol: &'a str,
        leverage: Decimal,
    ) -> BoxFuture<'a, VenueResult<()>> {
        Box::pin(async move {
            self.record(VenueCall::SetLeverage {
                symbol: symbol.to_string(),
                leverage,
            })?;
            self.delay().await;
            if leverage < Decimal::ONE {
                return Err(VenueError::Rejected(format!("invalid leverage {leverage}")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_market_order_fills_at_quote() {
        let venue = PaperVenue::new();
        venue.set_price("BTCUSDT", Price::new(dec!(50000)));

        let ack = venue
            .place_order("BTCUSDT", OrderSide::Buy, Size::new(dec!(0.1)), OrderType::Market)
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Filled);
        assert_eq!(ack.filled_qty, Size::new(dec!(0.1)));
        assert_eq!(ack.avg_price, Some(Price::new(dec!(50000))));
        assert_eq!(ack.order_id, "paper-1");
        assert_eq!(ack.raw["status"], "FILLED");
    }

    #[tokio::test]
    async fn test_accept_only() {
        let venue = PaperVenue::new();
        venue.set_price("BTCUSDT", Price::new(dec!(50000)));
        venue.set_accept_only(true);

        let ack = venue
            .place_order("BTCUSDT", OrderSide::Sell, Size::new(dec!(1)), OrderType::Limit)
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Accepted);
        assert!(!ack.has_fill());
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let venue = PaperVenue::new();
        venue.set_price("ETHUSDT", Price::new(dec!(3000)));
        venue.fail_next(VenueOp::GetPrice, VenueError::Unavailable("down".into()));

        assert!(venue.get_price("ETHUSDT").await.is_err());
        assert_eq!(
            venue.get_price("ETHUSDT").await,
            Ok(Price::new(dec!(3000)))
        );
        assert_eq!(venue.call_count(VenueOp::GetPrice), 2);
    }

    #[tokio::test]
    async fn test_fail_orders_for_symbol() {
        let venue = PaperVenue::new();
        venue.set_price("ETHUSDT", Price::new(dec!(3000)));
        venue.fail_orders_for("ETHUSDT", VenueError::Rejected("halted".into()));

        for _ in 0..2 {
            let result = venue
                .place_order("ETHUSDT", OrderSide::Buy, Size::new(dec!(1)), OrderType::Market)
                .await;
            assert_eq!(result, Err(VenueError::Rejected("halted".into())));
        }

        venue.clear_failures();
        assert!(venue
            .place_order("ETHUSDT", OrderSide::Buy, Size::new(dec!(1)), OrderType::Market)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_balances_are_static() {
        let venue = PaperVenue::new();
        venue.set_price("BTCUSDT", Price::new(dec!(100)));
        venue.set_balance("USDT", Balance::new(dec!(1000), dec!(0)));

        venue
            .place_order("BTCUSDT", OrderSide::Buy, Size::new(dec!(1)), OrderType::Market)
            .await
            .unwrap();
        let balances = venue.get_balances().await.unwrap();
        assert_eq!(balances["USDT"].total(), dec!(1000));
    }

    #[tokio::test]
    async fn test_set_leverage_validates() {
        let venue = PaperVenue::new();
        assert!(venue.set_leverage("BTCUSDT", dec!(5)).await.is_ok());
        assert!(venue.set_leverage("BTCUSDT", dec!(0.5)).await.is_err());
        assert_eq!(
            venue.calls()[0],
            VenueCall::SetLeverage {
                symbol: "BTCUSDT".into(),
                leverage: dec!(5)
            }
        );
    }
}
