//! Append-only trade journal.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rudder_core::{TradeRecord, TradeStatus};
use tracing::debug;

const DEFAULT_CAPACITY: usize = 10_000;

/// In-memory journal of execution attempts, in completion order.
///
/// Keeps the most recent `capacity` records (10 000 by default);
/// `total()` counts every record ever appended and `evicted()` the ones
/// dropped to stay within capacity.
#[derive(Debug)]
pub struct TradeJournal {
    records: Mutex<VecDeque<TradeRecord>>,
    capacity: usize,
    total: AtomicU64,
}

impl Default for TradeJournal {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TradeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            total: AtomicU64::new(0),
        }
    }

    pub fn append(&self, record: TradeRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            if let Some(evicted) = records.pop_front() {
                debug!(
                    cloid = %evicted.client_order_id,
                    symbol = %evicted.symbol,
                    capacity = self.capacity,
                    "Journal full, evicting oldest record"
                );
            }
        }
        records.push_back(record);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<TradeRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Up to `n` most recent records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<TradeRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn count_by_status(&self, status: TradeStatus) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Records dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        let records = self.records.lock();
        self.total().saturating_sub(records.len() as u64)
    }
}
