//! Cross-instrument market view.
//!
//! The view tracks the last trade per instrument as events stream by.
//! Best bid/ask are deliberately not cached: a snapshot reads them
//! from each book's view at call time, so they can never go stale.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use clob_book::BookService;
use clob_core::{Event, PriceTicks, Side, Size, TimestampNs, TradeEvent};

use crate::instrument::InstrumentId;

/// Best bid/ask and last trade for one instrument.
///
/// The `*_ok` and `has_last` flags qualify their fields; when false
/// the corresponding prices and sizes are meaningless.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPrices {
    pub bid_price: PriceTicks,
    pub bid_size: Size,
    pub bid_ok: bool,

    pub ask_price: PriceTicks,
    pub ask_size: Size,
    pub ask_ok: bool,

    pub last_price: PriceTicks,
    pub last_time: TimestampNs,
    pub has_last: bool,
}

/// Point-in-time snapshot across all instruments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub by_instrument: HashMap<InstrumentId, BestPrices>,
}

/// A book event tagged with its instrument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub instrument_id: InstrumentId,
    pub event: Event,
}

/// Aggregate state the market layer maintains itself: one last-trade
/// record per instrument, written by that instrument's forwarder.
#[derive(Debug, Default)]
pub struct MarketView {
    last_trade: RwLock<HashMap<InstrumentId, TradeEvent>>,
}

impl MarketView {
    pub fn new() -> Self {
        MarketView::default()
    }

    /// Record the event if it is a trade; other events carry nothing
    /// the market view keeps.
    pub fn apply(&self, instrument_id: InstrumentId, event: &Event) {
        if let Event::Trade(trade) = event {
            self.last_trade.write().insert(instrument_id, *trade);
        }
    }

    /// Build a snapshot covering every book in `books`, combining the
    /// stored last trades with a read-time query of each book's best
    /// levels.
    pub fn snapshot_with_books(
        &self,
        books: &HashMap<InstrumentId, BookService>,
    ) -> MarketSnapshot {
        let last_trade = self.last_trade.read();

        let mut by_instrument = HashMap::with_capacity(books.len());
        for (&instrument_id, book) in books {
            let mut best = BestPrices::default();

            if let Some(bid) = book.best(Side::Buy) {
                best.bid_price = bid.price;
                best.bid_size = bid.size;
                best.bid_ok = true;
            }
            if let Some(ask) = book.best(Side::Sell) {
                best.ask_price = ask.price;
                best.ask_size = ask.size;
                best.ask_ok = true;
            }
            if let Some(trade) = last_trade.get(&instrument_id) {
                best.last_price = trade.price;
                best.last_time = trade.time;
                best.has_last = true;
            }

            by_instrument.insert(instrument_id, best);
        }

        MarketSnapshot { by_instrument }
    }
}
