//! Order value object and the scalar types it is built from.
//!
//! Prices are integer ticks, sizes are integer units. The external
//! formatting of a price (decimal placement) is an instrument-level
//! concern; the engine never sees anything but ticks.

use serde::{Deserialize, Serialize};

use crate::side::Side;

/// Price in integer ticks.
pub type PriceTicks = i64;

/// Order quantity in integer units.
pub type Size = i64;

/// Opaque order identifier. Zero is never a valid id.
pub type OrderId = u64;

/// Opaque user/trader identifier. Zero is never a valid id.
pub type UserId = u64;

/// Nanosecond timestamp assigned by the service layer.
pub type TimestampNs = i64;

/// Order kind: limit or market.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

/// An order as submitted to the engine.
///
/// This is a value object: the engine copies what it needs into its own
/// resting-order storage and never mutates the input after acceptance.
/// `size` is the requested size on submit; reports carry the remaining
/// size separately.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub kind: OrderKind,
    /// Limit price in ticks. Ignored for market orders.
    pub price: PriceTicks,
    pub size: Size,
    /// Submission time in nanoseconds, set by the service layer.
    pub time: TimestampNs,
}
