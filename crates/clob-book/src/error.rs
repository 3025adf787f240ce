//! Error taxonomy for the orderbook service.

use thiserror::Error;

use clob_core::CoreError;

/// Errors surfaced by [`BookService`](crate::service::BookService)
/// commands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The matching core rejected the command.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The service has been closed; no further commands are accepted.
    #[error("service closed")]
    Closed,

    /// The caller's cancellation token fired before the reply arrived.
    /// The command may still have executed.
    #[error("command canceled")]
    Canceled,
}
