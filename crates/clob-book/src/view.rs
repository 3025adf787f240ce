//! Event-sourced read model of one book.
//!
//! The view is rebuilt purely from the engine's event stream, applied
//! in emission order by a single writer. Readers take the shared lock
//! briefly and always receive copies, never references into the maps.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use clob_core::{Event, OrderId, PriceTicks, Side, Size, TimestampNs, TradeEvent, UserId};

use crate::tape::TradeTape;

/// Aggregate size at one price.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: PriceTicks,
    pub size: Size,
}

/// Snapshot of a resting order as the view knows it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub price: PriceTicks,
    pub size: Size,
    pub time: TimestampNs,
}

#[derive(Debug, Copy, Clone)]
struct OrderState {
    user_id: UserId,
    side: Side,
    price: PriceTicks,
    size: Size,
    time: TimestampNs,
}

#[derive(Debug)]
struct ViewState {
    orders: HashMap<OrderId, OrderState>,
    bids: HashMap<PriceTicks, Size>,
    asks: HashMap<PriceTicks, Size>,
    tape: TradeTape,
}

impl ViewState {
    fn aggregate_mut(&mut self, side: Side) -> &mut HashMap<PriceTicks, Size> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn aggregate(&self, side: Side) -> &HashMap<PriceTicks, Size> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }
}

/// Read model for one instrument's book.
#[derive(Debug)]
pub struct BookView {
    state: RwLock<ViewState>,
}

impl BookView {
    /// Create an empty view with the given trade-tape capacity.
    pub fn new(tape_capacity: usize) -> Self {
        BookView {
            state: RwLock::new(ViewState {
                orders: HashMap::new(),
                bids: HashMap::new(),
                asks: HashMap::new(),
                tape: TradeTape::new(tape_capacity),
            }),
        }
    }

    /// Apply one event. Events must arrive in the order the engine
    /// produced them, with none skipped.
    pub fn apply(&self, event: &Event) {
        let mut state = self.state.write();
        match event {
            Event::Trade(e) => state.tape.append(*e),

            Event::Rested(e) => {
                state.orders.insert(
                    e.order_id,
                    OrderState {
                        user_id: e.user_id,
                        side: e.side,
                        price: e.price,
                        size: e.size,
                        time: e.time,
                    },
                );
                *state.aggregate_mut(e.side).entry(e.price).or_insert(0) += e.size;
            }

            Event::Reduced(e) => {
                let Some(st) = state.orders.get(&e.order_id).copied() else {
                    warn!(order_id = e.order_id, "reduce for unknown order id");
                    return;
                };
                let aggregate = state.aggregate_mut(st.side);
                let total = aggregate.entry(st.price).or_insert(0);
                *total += e.delta;
                if *total <= 0 {
                    aggregate.remove(&st.price);
                }
                if let Some(st) = state.orders.get_mut(&e.order_id) {
                    st.size = e.remaining;
                }
            }

            Event::Removed(e) => {
                let Some(st) = state.orders.remove(&e.order_id) else {
                    return;
                };
                let aggregate = state.aggregate_mut(st.side);
                let total = aggregate.entry(st.price).or_insert(0);
                *total -= st.size;
                if *total <= 0 {
                    aggregate.remove(&st.price);
                }
            }
        }
    }

    /// Aggregate size per price, sorted best to worst.
    pub fn levels(&self, side: Side) -> Vec<Level> {
        let state = self.state.read();
        let mut out: Vec<Level> = state
            .aggregate(side)
            .iter()
            .map(|(&price, &size)| Level { price, size })
            .collect();
        out.sort_by(|a, b| match side {
            Side::Buy => b.price.cmp(&a.price),
            Side::Sell => a.price.cmp(&b.price),
        });
        out
    }

    /// The best level of a side, if the side is non-empty.
    pub fn best(&self, side: Side) -> Option<Level> {
        let state = self.state.read();
        let aggregate = state.aggregate(side);
        let entry = match side {
            Side::Buy => aggregate.iter().max_by_key(|(&price, _)| price),
            Side::Sell => aggregate.iter().min_by_key(|(&price, _)| price),
        };
        entry.map(|(&price, &size)| Level { price, size })
    }

    /// Resting orders on a side, best price first, then time, then id.
    pub fn orders(&self, side: Side) -> Vec<RestingOrder> {
        let state = self.state.read();
        let mut out: Vec<RestingOrder> = state
            .orders
            .iter()
            .filter(|(_, st)| st.side == side)
            .map(|(&id, st)| RestingOrder {
                id,
                user_id: st.user_id,
                side: st.side,
                price: st.price,
                size: st.size,
                time: st.time,
            })
            .collect();
        out.sort_by(|a, b| {
            let by_price = match side {
                Side::Buy => b.price.cmp(&a.price),
                Side::Sell => a.price.cmp(&b.price),
            };
            by_price.then(a.time.cmp(&b.time)).then(a.id.cmp(&b.id))
        });
        out
    }

    /// The last `n` trades in chronological order.
    pub fn trades_last(&self, n: usize) -> Vec<TradeEvent> {
        self.state.read().tape.last(n)
    }
}
