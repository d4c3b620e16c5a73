//! Per-symbol price history.

use std::collections::{BTreeMap, VecDeque};

use rudder_core::Price;

/// Fixed-capacity ring buffer of prices per symbol, oldest first.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    capacity: usize,
    series: BTreeMap<String, VecDeque<Price>>,
}

impl PriceHistory {
    /// Create a history keeping at most `capacity` prices per symbol.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `price`, evicting the oldest entry when full.
    pub fn push(&mut self, symbol: &str, price: Price) {
        let capacity = self.capacity;
        let buf = self
            .series
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if buf.len() == capacity {
            buf.pop_front();
        }
        buf.push_back(price);
    }

    pub fn last(&self, symbol: &str) -> Option<Price> {
        self.series.get(symbol).and_then(|buf| buf.back().copied())
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    /// Copy of the series for `symbol`, oldest first.
    pub fn series(&self, symbol: &str) -> Vec<Price> {
        self.series
            .get(symbol)
            .map(|buf| buf.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Symbols with at least one price, in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series
            .iter()
            .filter(|(_, buf)| !buf.is_empty())
            .map(|(symbol, _)| symbol.as_str())
    }
}
