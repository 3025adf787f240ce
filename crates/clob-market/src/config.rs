//! Configuration for the market service.

use clob_book::BookConfig;

/// Configuration for a [`MarketService`] and the book services it
/// creates.
///
/// [`MarketService`]: crate::service::MarketService
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Configuration applied to every per-instrument book service.
    pub book: BookConfig,
    /// Size of the consolidated event channel.
    pub consolidated_event_capacity: usize,
    /// Whether the consolidated channel drops on overflow. When false,
    /// a full channel blocks the forwarders instead.
    pub drop_consolidated_events: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            book: BookConfig::default(),
            consolidated_event_capacity: 1024,
            drop_consolidated_events: true,
        }
    }
}

impl MarketConfig {
    pub(crate) fn normalized(mut self) -> Self {
        if self.consolidated_event_capacity == 0 {
            self.consolidated_event_capacity = MarketConfig::default().consolidated_event_capacity;
        }
        self
    }
}
