//! Error taxonomy for the matching core.

use thiserror::Error;

/// Errors returned by [`Engine`](crate::engine::Engine) commands.
///
/// A rejected command leaves the book untouched and emits no events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The order failed validation (zero id/user, non-positive size or
    /// price, wrong kind for the entry point, missing timestamp).
    #[error("invalid order")]
    InvalidOrder,

    /// An order with this id is already resting on the book.
    #[error("duplicate order id")]
    DuplicateId,

    /// No resting order with this id.
    #[error("order not found")]
    NotFound,
}
