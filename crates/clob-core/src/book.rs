//! Book storage: resting orders, price levels, and the two sides.
//!
//! Resting orders live in a generational arena and are linked into
//! per-price FIFO queues by handle, so a cancel can unlink its node in
//! O(1) without raw pointers. Each side keeps its levels in a
//! `BTreeMap` keyed by price; best bid is the last key, best ask the
//! first. Handles never leave this crate.

use std::collections::{BTreeMap, HashMap};

use crate::events::{Event, OrderReducedEvent, OrderRemovedEvent, RemoveReason, TradeEvent};
use crate::order::{Order, OrderId, PriceTicks, Size, TimestampNs, UserId};
use crate::report::Fill;
use crate::side::Side;

/// Generational handle into the order arena. A reused slot bumps its
/// generation, so a stale handle can never resolve to a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OrderHandle {
    index: u32,
    generation: u32,
}

/// A resting order node. Created when an order rests, destroyed when it
/// is fully filled or canceled.
#[derive(Debug)]
pub(crate) struct RestingOrder {
    pub(crate) id: OrderId,
    pub(crate) user_id: UserId,
    pub(crate) side: Side,
    pub(crate) price: PriceTicks,
    /// Remaining (unfilled) size.
    pub(crate) size: Size,
    pub(crate) time: TimestampNs,

    prev: Option<OrderHandle>,
    next: Option<OrderHandle>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    order: Option<RestingOrder>,
}

/// Dense arena of resting orders with a free list for slot reuse.
#[derive(Debug, Default)]
pub(crate) struct OrderArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl OrderArena {
    fn insert(&mut self, order: RestingOrder) -> OrderHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.order = Some(order);
                OrderHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    order: Some(order),
                });
                OrderHandle {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn get(&self, handle: OrderHandle) -> Option<&RestingOrder> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.order.as_ref()
    }

    fn get_mut(&mut self, handle: OrderHandle) -> Option<&mut RestingOrder> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.order.as_mut()
    }

    fn remove(&mut self, handle: OrderHandle) -> Option<RestingOrder> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let order = slot.order.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(order)
    }
}

/// One price level: a FIFO queue of resting orders plus the running
/// sum of their remaining sizes.
#[derive(Debug)]
struct Level {
    head: Option<OrderHandle>,
    tail: Option<OrderHandle>,
    total_volume: Size,
}

impl Level {
    fn new() -> Self {
        Level {
            head: None,
            tail: None,
            total_volume: 0,
        }
    }

    fn push_back(&mut self, handle: OrderHandle, arena: &mut OrderArena) {
        if let Some(node) = arena.get_mut(handle) {
            node.prev = self.tail;
            node.next = None;
        }
        match self.tail {
            Some(tail) => {
                if let Some(node) = arena.get_mut(tail) {
                    node.next = Some(handle);
                }
            }
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
    }

    fn pop_front(&mut self, arena: &mut OrderArena) -> Option<RestingOrder> {
        let head = self.head?;
        match arena.remove(head) {
            Some(node) => {
                self.head = node.next;
                match node.next {
                    Some(next) => {
                        if let Some(n) = arena.get_mut(next) {
                            n.prev = None;
                        }
                    }
                    None => self.tail = None,
                }
                Some(node)
            }
            None => {
                // Dangling head handle; unreachable in correct
                // operation. Reset the queue rather than loop on it.
                self.head = None;
                self.tail = None;
                None
            }
        }
    }

    fn unlink(&mut self, handle: OrderHandle, arena: &mut OrderArena) -> Option<RestingOrder> {
        let node = arena.remove(handle)?;
        match node.prev {
            Some(prev) => {
                if let Some(p) = arena.get_mut(prev) {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = arena.get_mut(next) {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        Some(node)
    }
}

/// One side of the book. Levels are keyed by price; the map only ever
/// contains levels with a non-empty queue.
#[derive(Debug)]
struct BookSide {
    side: Side,
    levels: BTreeMap<PriceTicks, Level>,
}

impl BookSide {
    fn new(side: Side) -> Self {
        BookSide {
            side,
            levels: BTreeMap::new(),
        }
    }

    fn best_price(&self) -> Option<PriceTicks> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }
}

/// The full book for one instrument: both sides, the order arena, and
/// the id index used by cancels.
#[derive(Debug)]
pub(crate) struct Book {
    bids: BookSide,
    asks: BookSide,
    arena: OrderArena,
    orders: HashMap<OrderId, OrderHandle>,
}

impl Book {
    pub(crate) fn new() -> Self {
        Book {
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
            arena: OrderArena::default(),
            orders: HashMap::new(),
        }
    }

    /// True when an order with this id is resting.
    pub(crate) fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    /// Place the unmatched remainder of `order` at the back of its own
    /// side's queue at `order.price`.
    pub(crate) fn insert_resting(&mut self, order: &Order, remaining: Size) {
        let handle = self.arena.insert(RestingOrder {
            id: order.id,
            user_id: order.user_id,
            side: order.side,
            price: order.price,
            size: remaining,
            time: order.time,
            prev: None,
            next: None,
        });

        let book_side = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = book_side.levels.entry(order.price).or_insert_with(Level::new);
        level.push_back(handle, &mut self.arena);
        level.total_volume += remaining;

        self.orders.insert(order.id, handle);
    }

    /// Unlink and return the resting order with this id, removing its
    /// level if the queue drained.
    pub(crate) fn remove(&mut self, id: OrderId) -> Option<RestingOrder> {
        let handle = self.orders.remove(&id)?;
        let (side, price) = {
            let node = self.arena.get(handle)?;
            (node.side, node.price)
        };

        let book_side = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let Some(level) = book_side.levels.get_mut(&price) else {
            return self.arena.remove(handle);
        };

        let node = level.unlink(handle, &mut self.arena)?;
        level.total_volume -= node.size;
        if level.total_volume <= 0 || level.head.is_none() {
            book_side.levels.remove(&price);
        }
        Some(node)
    }

    /// Consume makers from the side opposite the taker, best level
    /// first, FIFO within each level.
    ///
    /// `limit` is the taker's limit price, or `None` for a market
    /// order. Decrements `remaining` by the traded size and appends to
    /// `fills` and `events` in emission order.
    pub(crate) fn match_taker(
        &mut self,
        taker: &Order,
        remaining: &mut Size,
        limit: Option<PriceTicks>,
        fills: &mut Vec<Fill>,
        events: &mut Vec<Event>,
    ) {
        while *remaining > 0 {
            let opp = match taker.side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            let Some(best_price) = opp.best_price() else {
                break;
            };

            if let Some(limit_price) = limit {
                let beyond = match taker.side {
                    Side::Buy => best_price > limit_price,
                    Side::Sell => best_price < limit_price,
                };
                if beyond {
                    break;
                }
            }

            let Some(level) = opp.levels.get_mut(&best_price) else {
                break;
            };

            while *remaining > 0 {
                let Some(head) = level.head else {
                    break;
                };
                let maker = self
                    .arena
                    .get(head)
                    .map(|m| (m.id, m.user_id, m.side, m.price, m.size));
                let Some((maker_id, maker_user_id, maker_side, maker_price, maker_size)) = maker
                else {
                    // Dangling head handle; drop it from the queue.
                    level.pop_front(&mut self.arena);
                    continue;
                };

                if maker_size <= 0 {
                    // Defective maker; drain it without events.
                    level.pop_front(&mut self.arena);
                    self.orders.remove(&maker_id);
                    continue;
                }

                let traded = (*remaining).min(maker_size);
                if traded <= 0 {
                    level.pop_front(&mut self.arena);
                    self.orders.remove(&maker_id);
                    continue;
                }

                *remaining -= traded;
                let maker_remaining = maker_size - traded;
                if let Some(node) = self.arena.get_mut(head) {
                    node.size = maker_remaining;
                }

                level.total_volume -= traded;

                fills.push(Fill {
                    maker_order_id: maker_id,
                    price: best_price,
                    size: traded,
                });
                events.push(Event::Trade(TradeEvent {
                    price: best_price,
                    size: traded,
                    taker_side: taker.side,
                    time: taker.time,
                    taker_order_id: taker.id,
                    taker_user_id: taker.user_id,
                    maker_order_id: maker_id,
                    maker_user_id,
                }));

                if maker_remaining <= 0 {
                    level.pop_front(&mut self.arena);
                    self.orders.remove(&maker_id);
                    events.push(Event::Removed(OrderRemovedEvent {
                        order_id: maker_id,
                        reason: RemoveReason::Filled,
                        remaining: 0,
                        price: maker_price,
                        side: maker_side,
                        user_id: maker_user_id,
                        time: taker.time,
                    }));
                } else {
                    events.push(Event::Reduced(OrderReducedEvent {
                        order_id: maker_id,
                        delta: -traded,
                        remaining: maker_remaining,
                        price: maker_price,
                        side: maker_side,
                        user_id: maker_user_id,
                        match_time: taker.time,
                    }));
                }
            }

            let drained = level.total_volume <= 0 || level.head.is_none();
            if drained {
                opp.levels.remove(&best_price);
            }
        }
    }
}
