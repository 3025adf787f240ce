//! clob-book
//!
//! Concurrent orderbook service for a single instrument:
//! - [`BookView`]: event-sourced read model (levels, resting orders,
//!   trade tape), kept in lockstep with the engine
//! - [`BookService`]: single-writer command pipeline around one
//!   [`clob_core::Engine`], with id/time assignment and event fan-out
//!
//! The engine itself lives in `clob-core` and stays free of clocks,
//! ids, and channels; everything temporal or concurrent is here.

pub mod clock;
pub mod config;
pub mod error;
pub mod service;
pub mod tape;
pub mod view;

pub use config::BookConfig;
pub use error::ServiceError;
pub use service::BookService;
pub use tape::TradeTape;
pub use view::{BookView, Level, RestingOrder};
