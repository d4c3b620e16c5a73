//! Price source seam.
//!
//! The supervisor only needs prices; the execution side adapts its
//! venue to this trait.

use std::future::Future;
use std::pin::Pin;

use rudder_core::Price;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Anything that can quote a last price for a symbol.
pub trait PriceSource: Send + Sync {
    /// Last traded price, or an error message suitable for logging.
    fn last_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<Price, String>>;
}
