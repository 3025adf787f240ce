//! clob-market
//!
//! Multi-instrument market layer:
//! - one [`clob_book::BookService`] per registered instrument
//! - command and query routing by instrument id
//! - a consolidated, instrument-tagged event stream
//! - a cross-instrument best-prices snapshot
//!
//! The market layer adds no matching semantics of its own; each
//! instrument's book is independent and there is no ordering across
//! instruments.

pub mod config;
pub mod error;
pub mod instrument;
pub mod service;
pub mod view;

pub use config::MarketConfig;
pub use error::MarketError;
pub use instrument::{Instrument, InstrumentId};
pub use service::MarketService;
pub use view::{BestPrices, MarketEvent, MarketSnapshot, MarketView};
