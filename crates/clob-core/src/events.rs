//! Lifecycle events emitted by the matching engine.
//!
//! Events are small copyable values. The engine emits them in a strict
//! order per command (trades with their maker updates first, then a
//! possible rest), and the read model replays them verbatim, so the
//! sequence alone fully reconstructs the book.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::order::{OrderId, PriceTicks, Size, TimestampNs, UserId};
use crate::side::Side;

/// Why an order left the book.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveReason {
    Filled,
    Canceled,
}

impl fmt::Display for RemoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoveReason::Filled => write!(f, "FILLED"),
            RemoveReason::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// A trade between an incoming taker and a resting maker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Execution price: always the maker's level price.
    pub price: PriceTicks,
    pub size: Size,
    pub taker_side: Side,
    pub time: TimestampNs,

    pub taker_order_id: OrderId,
    pub taker_user_id: UserId,
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
}

/// An order (or its unmatched remainder) was placed on the book.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRestedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub price: PriceTicks,
    /// Size actually rested, i.e. the remainder after matching.
    pub size: Size,
    pub time: TimestampNs,
}

/// A resting order was partially filled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReducedEvent {
    pub order_id: OrderId,
    /// Signed change in remaining size; always negative here.
    pub delta: Size,
    /// Remaining size after the fill.
    pub remaining: Size,
    pub price: PriceTicks,
    pub side: Side,
    pub user_id: UserId,
    pub match_time: TimestampNs,
}

/// An order left the book entirely, by full fill or by cancel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRemovedEvent {
    pub order_id: OrderId,
    pub reason: RemoveReason,
    /// Size removed from the book: 0 for a full fill, the unfilled
    /// remainder for a cancel.
    pub remaining: Size,
    pub price: PriceTicks,
    pub side: Side,
    pub user_id: UserId,
    pub time: TimestampNs,
}

/// The closed set of orderbook events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Trade(TradeEvent),
    Rested(OrderRestedEvent),
    Reduced(OrderReducedEvent),
    Removed(OrderRemovedEvent),
}
