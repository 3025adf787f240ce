//! Instrument descriptors.

use serde::{Deserialize, Serialize};

/// Identifies one tradable instrument within a market.
pub type InstrumentId = u64;

/// A tradable instrument. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: String,
    /// Decimal places used when formatting prices for display. The
    /// engine itself only ever sees integer ticks.
    pub decimals: i8,
}
