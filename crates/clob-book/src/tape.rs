//! Bounded trade tape.

use std::collections::VecDeque;

use clob_core::TradeEvent;

/// Fixed-capacity ring of trade events; the oldest entry is dropped
/// once the tape is full.
#[derive(Debug)]
pub struct TradeTape {
    buf: VecDeque<TradeEvent>,
    capacity: usize,
}

impl TradeTape {
    /// Create a tape holding up to `capacity` trades (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TradeTape {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a trade, evicting the oldest if the tape is full.
    pub fn append(&mut self, trade: TradeEvent) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(trade);
    }

    /// The last `n` trades in chronological order (newest last).
    pub fn last(&self, n: usize) -> Vec<TradeEvent> {
        if n == 0 {
            return Vec::new();
        }
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
