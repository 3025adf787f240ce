//! clob-core
//!
//! Deterministic matching logic for a single instrument:
//! - value types (sides, order kinds, scalar aliases)
//! - lifecycle events
//! - per-instrument book with price-time priority
//! - the matching engine itself
//!
//! This crate is intentionally free of clocks, id generation, and
//! concurrency primitives. The engine is a plain state machine:
//! callers feed it fully-formed orders and get back a report plus the
//! ordered list of events describing every state transition.

pub mod book;
pub mod engine;
pub mod error;
pub mod events;
pub mod order;
pub mod report;
pub mod side;

pub use engine::Engine;
pub use error::CoreError;

pub use events::{
    Event,
    OrderReducedEvent,
    OrderRemovedEvent,
    OrderRestedEvent,
    RemoveReason,
    TradeEvent,
};

pub use order::{Order, OrderId, OrderKind, PriceTicks, Size, TimestampNs, UserId};
pub use report::{CancelReport, Fill, SubmitReport};
pub use side::Side;
