//! Portfolio ledger.
//!
//! Quantities are signed: positive is long, negative is short. A short
//! only ever comes from an explicit SELL fill; nothing here opens one
//! implicitly.

use std::collections::BTreeMap;

use rudder_core::{OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{PositionError, PositionResult};

/// Assets valued 1:1 in USD.
const STABLECOINS: [&str; 5] = ["USD", "USDT", "USDC", "BUSD", "FDUSD"];

/// Quote asset used to look up marks for non-stable balances.
const QUOTE_ASSET: &str = "USDT";

/// An open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed quantity: >0 long, <0 short.
    pub quantity: Decimal,
    pub average_price: Price,
}

impl Position {
    pub fn side(&self) -> OrderSide {
        if self.quantity.is_sign_negative() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }

    pub fn abs_size(&self) -> Size {
        Size::new(self.quantity.abs())
    }

    /// Unrealized PnL at `mark`.
    pub fn unrealized_pnl(&self, mark: Price) -> Decimal {
        (mark.inner() - self.average_price.inner()) * self.quantity
    }

    /// Absolute notional at `mark`; `None` on overflow.
    pub fn notional(&self, mark: Price) -> Option<Price> {
        self.abs_size().notional(mark)
    }
}

/// Result of applying one fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOutcome {
    /// PnL realized by this fill (zero when the position only grew).
    pub realized_pnl: Decimal,
    /// Position after the fill; `None` when it was closed.
    pub position: Option<Position>,
}

/// Per-position view for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_price: Price,
    pub unrealized_pnl: Decimal,
}

/// Point-in-time view of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub positions: Vec<PositionSnapshot>,
    pub equity_usd: Price,
}

/// Position ledger.
///
/// Not synchronized; owners wrap it in a lock and never hold that lock
/// across an await point.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    positions: BTreeMap<String, Position>,
    realized_pnl: Decimal,
    marks: BTreeMap<String, Price>,
    fill_count: u64,
}

impl Portfolio {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fill of `qty` at `price`.
    ///
    /// Same direction: weighted-average entry. Opposite direction:
    /// realize PnL on the closed part; a fill larger than the position
    /// closes it and opens the remainder on the other side at `price`.
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: OrderSide,
        qty: Size,
        price: Price,
    ) -> PositionResult<FillOutcome> {
        if !qty.is_positive() {
            return Err(PositionError::InvalidFill {
                symbol: symbol.to_string(),
                reason: format!("quantity must be positive, got {qty}"),
            });
        }
        if !price.is_positive() {
            return Err(PositionError::InvalidFill {
                symbol: symbol.to_string(),
                reason: format!("price must be positive, got {price}"),
            });
        }

        let signed_fill = side.sign() * qty.inner();
        let (current_qty, current_avg) = self
            .positions
            .get(symbol)
            .map(|p| (p.quantity, p.average_price))
            .unwrap_or((Decimal::ZERO, Price::ZERO));

        let mut realized = Decimal::ZERO;
        let (new_qty, new_avg) = if current_qty.is_zero()
            || current_qty.is_sign_negative() == signed_fill.is_sign_negative()
        {
            // Same side (or flat): increase position
            let old_notional = current_qty.abs() * current_avg.inner();
            let fill_notional = qty.inner() * price.inner();
            let new_qty = current_qty + signed_fill;
            let avg = (old_notional + fill_notional) / new_qty.abs();
            (new_qty, Price::new(avg))
        } else {
            // Opposite side: reduce, close or flip
            let closed = current_qty.abs().min(qty.inner());
            let direction = if current_qty.is_sign_negative() {
                Decimal::NEGATIVE_ONE
            } else {
                Decimal::ONE
            };
            realized = (price.inner() - current_avg.inner()) * closed * direction;

            let remaining = qty.inner() - closed;
            if remaining.is_zero() {
                (current_qty + signed_fill, current_avg)
            } else {
                (side.sign() * remaining, price)
            }
        };

        self.realized_pnl += realized;
        self.marks.insert(symbol.to_string(), price);
        self.fill_count += 1;

        let position = if new_qty.is_zero() {
            self.positions.remove(symbol);
            None
        } else {
            let position = Position {
                symbol: symbol.to_string(),
                quantity: new_qty,
                average_price: new_avg,
            };
            self.positions.insert(symbol.to_string(), position.clone());
            Some(position)
        };

        debug!(
            symbol,
            side = %side,
            qty = %qty,
            price = %price,
            position_qty = %new_qty,
            average_price = %new_avg,
            realized = %realized,
            "Fill applied"
        );

        Ok(FillOutcome {
            realized_pnl: realized,
            position,
        })
    }

    /// Record the latest mark for `symbol`.
    pub fn update_mark(&mut self, symbol: &str, price: Price) {
        if price.is_positive() {
            self.marks.insert(symbol.to_string(), price);
        }
    }

    pub fn mark(&self, symbol: &str) -> Option<Price> {
        self.marks.get(symbol).copied()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Number of fills applied since creation.
    pub fn fill_count(&self) -> u64 {
        self.fill_count
    }

    /// Unrealized PnL of `symbol` at `mark`; zero when flat.
    pub fn unrealized_pnl(&self, symbol: &str, mark: Price) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.unrealized_pnl(mark))
            .unwrap_or(Decimal::ZERO)
    }

    /// Total unrealized PnL, using `marks` first and the last recorded
    /// mark otherwise. Positions with no mark contribute zero.
    pub fn total_unrealized(&self, marks: &BTreeMap<String, Price>) -> Decimal {
        self.positions
            .values()
            .filter_map(|p| {
                marks
                    .get(&p.symbol)
                    .or_else(|| self.marks.get(&p.symbol))
                    .map(|mark| p.unrealized_pnl(*mark))
            })
            .sum()
    }

    /// Account value in USD: balances plus unrealized PnL at last marks.
    ///
    /// Stablecoins count 1:1; other assets are valued at the last mark of
    /// `<ASSET>USDT` and skipped when none is known.
    pub fn equity_usd(&self, balances: &BTreeMap<String, Decimal>) -> Price {
        let mut total = Decimal::ZERO;
        for (asset, amount) in balances {
            let asset = asset.to_ascii_uppercase();
            if STABLECOINS.contains(&asset.as_str()) {
                total += *amount;
                continue;
            }
            match self.marks.get(&format!("{asset}{QUOTE_ASSET}")) {
                Some(mark) => total += *amount * mark.inner(),
                None => trace!(asset = %asset, "No mark for balance, skipping"),
            }
        }
        Price::new(total + self.total_unrealized(&BTreeMap::new()))
    }

    pub fn snapshot(&self, balances: &BTreeMap<String, Decimal>) -> PortfolioSnapshot {
        let positions: Vec<PositionSnapshot> = self
            .positions
            .values()
            .map(|p| {
                let mark = self.marks.get(&p.symbol).copied().unwrap_or(p.average_price);
                PositionSnapshot {
                    symbol: p.symbol.clone(),
                    quantity: p.quantity,
                    average_price: p.average_price,
                    unrealized_pnl: p.unrealized_pnl(mark),
                }
            })
            .collect();

        PortfolioSnapshot {
            realized_pnl: self.realized_pnl,
            unrealized_pnl: positions.iter().map(|p| p.unrealized_pnl).sum(),
            positions,
            equity_usd: self.equity_usd(balances),
        }
    }
}
