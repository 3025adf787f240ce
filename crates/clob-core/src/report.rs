//! Synchronous reports returned to the submitter of a command.
//!
//! Reports summarize what the engine did with one command; the event
//! stream carries the same information for everyone else.

use serde::{Deserialize, Serialize};

use crate::order::{OrderId, PriceTicks, Size};

/// One maker consumed while matching a single taker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub price: PriceTicks,
    pub size: Size,
}

/// Result of a limit or market submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReport {
    pub order_id: OrderId,
    /// Unfilled size at return. Zero when fully filled; for a market
    /// order it may be positive if the opposite side ran out.
    pub remaining: Size,
    pub fills: Vec<Fill>,
    /// True when the unfilled remainder was placed on the book.
    pub rested: bool,
}

/// Result of a cancel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReport {
    pub order_id: OrderId,
    /// Remaining size the order still had when it was canceled.
    pub canceled_size: Size,
}
