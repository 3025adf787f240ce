//! Error taxonomy for the market service.

use thiserror::Error;

use clob_book::ServiceError;

/// Errors surfaced by [`MarketService`](crate::service::MarketService).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// The underlying book service rejected or aborted the command.
    #[error(transparent)]
    Book(#[from] ServiceError),

    /// No instrument registered under this id.
    #[error("unknown instrument")]
    UnknownInstrument,
}
