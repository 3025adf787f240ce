//! Configuration for the orderbook service.

/// Capacities and the external drop policy for one [`BookService`].
///
/// [`BookService`]: crate::service::BookService
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Size of the inbound command queue.
    pub command_queue_capacity: usize,
    /// Size of the internal authoritative event channel. Never drops;
    /// when full it back-pressures the worker.
    pub internal_event_capacity: usize,
    /// Size of the external subscriber channel.
    pub external_event_capacity: usize,
    /// Capacity of the trade tape ring buffer.
    pub trade_tape_capacity: usize,
    /// Whether the external channel drops events on overflow. When
    /// false, a full external channel blocks the dispatcher instead.
    pub drop_external_events: bool,
}

impl Default for BookConfig {
    fn default() -> Self {
        BookConfig {
            command_queue_capacity: 256,
            internal_event_capacity: 1024,
            external_event_capacity: 256,
            trade_tape_capacity: 1000,
            drop_external_events: true,
        }
    }
}

impl BookConfig {
    /// Replace zero capacities with the defaults.
    pub(crate) fn normalized(mut self) -> Self {
        let defaults = BookConfig::default();
        if self.command_queue_capacity == 0 {
            self.command_queue_capacity = defaults.command_queue_capacity;
        }
        if self.internal_event_capacity == 0 {
            self.internal_event_capacity = defaults.internal_event_capacity;
        }
        if self.external_event_capacity == 0 {
            self.external_event_capacity = defaults.external_event_capacity;
        }
        if self.trade_tape_capacity == 0 {
            self.trade_tape_capacity = defaults.trade_tape_capacity;
        }
        self
    }
}
