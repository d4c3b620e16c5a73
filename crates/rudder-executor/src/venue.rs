//! Venue port.
//!
//! The agent talks to an exchange only through [`Venue`]. Every call is
//! bounded by [`call_with_timeout`], which also records latency and
//! failures.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rudder_core::{OrderSide, OrderType, Price, Size};
use rudder_strategy::{BoxFuture, PriceSource};
use rudder_telemetry::Metrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{VenueError, VenueResult};

/// Free and locked amount of one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn new(free: Decimal, locked: Decimal) -> Self {
        Self { free, locked }
    }

    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    /// Resting, nothing filled yet.
    Accepted,
    PartiallyFilled,
    Filled,
}

/// Venue acknowledgement of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub status: AckStatus,
    pub filled_qty: Size,
    /// Average fill price, when anything filled.
    pub avg_price: Option<Price>,
    /// Venue payload, kept verbatim on the trade record.
    pub raw: serde_json::Value,
}

impl OrderAck {
    pub fn has_fill(&self) -> bool {
        self.status != AckStatus::Accepted && self.filled_qty.is_positive()
    }
}

/// Exchange operations used by the agent.
///
/// Implementations must be safe to call concurrently for different
/// symbols. Calls return boxed futures so the trait stays object safe.
pub trait Venue: Send + Sync {
    fn name(&self) -> &str;

    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>>;

    fn get_balances(&self) -> BoxFuture<'_, VenueResult<BTreeMap<String, Balance>>>;

    fn place_order<'a>(
        &'a self,
        symbol: &'a str,
        side: OrderSide,
        qty: Size,
        order_type: OrderType,
    ) -> BoxFuture<'a, VenueResult<OrderAck>>;

    fn set_leverage<'a>(&'a self, symbol: &'a str, leverage: Decimal)
        -> BoxFuture<'a, VenueResult<()>>;
}

pub type DynVenue = Arc<dyn Venue>;

/// Run one venue call under `timeout`, recording latency and failures.
pub async fn call_with_timeout<T, F>(op: &'static str, timeout: Duration, fut: F) -> VenueResult<T>
where
    F: Future<Output = VenueResult<T>>,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(VenueError::Timeout {
            op,
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    };
    Metrics::venue_latency(op, started.elapsed().as_secs_f64() * 1000.0);
    if let Err(e) = &result {
        warn!(op, code = e.code(), error = %e, "Venue call failed");
        Metrics::venue_error(op, e.code());
    }
    result
}

/// Adapts a [`Venue`] to the supervisor's [`PriceSource`].
pub struct VenuePriceSource {
    venue: DynVenue,
    timeout: Duration,
}

impl VenuePriceSource {
    #[must_use]
    pub fn new(venue: DynVenue, timeout: Duration) -> Self {
        Self { venue, timeout }
    }
}

impl PriceSource for VenuePriceSource {
    fn last_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<Price, String>> {
        Box::pin(async move {
            call_with_timeout("get_price", self.timeout, self.venue.get_price(symbol))
                .await
                .map_err(|e| e.to_string())
        })
    }
}
