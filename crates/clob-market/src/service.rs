//! Market service: N instrument books behind one façade.
//!
//! Commands are routed by instrument id to the owning book service.
//! One forwarder task per instrument consumes that book's external
//! events, feeds the market view, and republishes the events tagged
//! with their instrument on the consolidated channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use clob_book::{BookService, Level, RestingOrder};
use clob_core::{CancelReport, Event, OrderId, PriceTicks, Side, Size, SubmitReport, TradeEvent, UserId};

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::instrument::{Instrument, InstrumentId};
use crate::view::{MarketEvent, MarketSnapshot, MarketView};

/// Multi-instrument market façade.
#[derive(Debug)]
pub struct MarketService {
    instruments: HashMap<InstrumentId, Instrument>,
    books: HashMap<InstrumentId, BookService>,
    view: Arc<MarketView>,
    consolidated_rx: Mutex<Option<mpsc::Receiver<MarketEvent>>>,
    dropped_consolidated: Arc<AtomicU64>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MarketService {
    /// Create one book service per instrument and start its event
    /// forwarder. Must be called from within a tokio runtime.
    pub fn new(instruments: Vec<Instrument>, cfg: MarketConfig) -> Self {
        let cfg = cfg.normalized();

        let (consolidated_tx, consolidated_rx) = mpsc::channel(cfg.consolidated_event_capacity);
        let view = Arc::new(MarketView::new());
        let dropped = Arc::new(AtomicU64::new(0));
        let shutdown = CancellationToken::new();

        let mut registry = HashMap::with_capacity(instruments.len());
        let mut books = HashMap::with_capacity(instruments.len());
        let mut tasks = Vec::with_capacity(instruments.len());

        for instrument in instruments {
            let instrument_id = instrument.id;
            let book = BookService::new(cfg.book.clone());

            match book.events() {
                Some(events) => {
                    tasks.push(tokio::spawn(run_forwarder(
                        instrument_id,
                        events,
                        view.clone(),
                        consolidated_tx.clone(),
                        cfg.drop_consolidated_events,
                        dropped.clone(),
                        shutdown.clone(),
                    )));
                }
                None => {
                    // A fresh book always yields its stream once.
                    warn!(instrument_id, "book service had no event stream");
                }
            }

            registry.insert(instrument_id, instrument);
            books.insert(instrument_id, book);
        }
        // The forwarders hold the only senders; the consolidated
        // channel closes when the last forwarder exits.
        drop(consolidated_tx);

        MarketService {
            instruments: registry,
            books,
            view,
            consolidated_rx: Mutex::new(Some(consolidated_rx)),
            dropped_consolidated: dropped,
            shutdown,
            tasks: Mutex::new(tasks),
        }
    }

    /// Submit a limit order to an instrument's book.
    pub async fn submit_limit(
        &self,
        ctx: &CancellationToken,
        instrument_id: InstrumentId,
        user_id: UserId,
        side: Side,
        price: PriceTicks,
        size: Size,
    ) -> Result<SubmitReport, MarketError> {
        let book = self.book(instrument_id)?;
        Ok(book.submit_limit(ctx, user_id, side, price, size).await?)
    }

    /// Submit a market order to an instrument's book.
    pub async fn submit_market(
        &self,
        ctx: &CancellationToken,
        instrument_id: InstrumentId,
        user_id: UserId,
        side: Side,
        size: Size,
    ) -> Result<SubmitReport, MarketError> {
        let book = self.book(instrument_id)?;
        Ok(book.submit_market(ctx, user_id, side, size).await?)
    }

    /// Cancel a resting order on an instrument's book.
    pub async fn cancel(
        &self,
        ctx: &CancellationToken,
        instrument_id: InstrumentId,
        order_id: OrderId,
    ) -> Result<CancelReport, MarketError> {
        let book = self.book(instrument_id)?;
        Ok(book.cancel(ctx, order_id).await?)
    }

    /// Aggregate levels for one instrument and side.
    pub fn levels(
        &self,
        instrument_id: InstrumentId,
        side: Side,
    ) -> Result<Vec<Level>, MarketError> {
        Ok(self.book(instrument_id)?.levels(side))
    }

    /// Resting orders for one instrument and side.
    pub fn orders(
        &self,
        instrument_id: InstrumentId,
        side: Side,
    ) -> Result<Vec<RestingOrder>, MarketError> {
        Ok(self.book(instrument_id)?.orders(side))
    }

    /// The last `n` trades for one instrument.
    pub fn trades_last(
        &self,
        instrument_id: InstrumentId,
        n: usize,
    ) -> Result<Vec<TradeEvent>, MarketError> {
        Ok(self.book(instrument_id)?.trades_last(n))
    }

    /// Best bid/ask and last trade across every instrument. Best
    /// levels are read from the child views at call time.
    pub fn snapshot(&self) -> MarketSnapshot {
        self.view.snapshot_with_books(&self.books)
    }

    /// All registered instrument descriptors.
    pub fn instruments(&self) -> Vec<Instrument> {
        self.instruments.values().cloned().collect()
    }

    /// Take the consolidated event stream. Single-consumer; returns
    /// `Some` exactly once.
    pub fn events(&self) -> Option<mpsc::Receiver<MarketEvent>> {
        self.consolidated_rx.lock().take()
    }

    /// Number of events dropped from the consolidated channel so far,
    /// across all instruments.
    pub fn dropped_consolidated_events(&self) -> u64 {
        self.dropped_consolidated.load(Ordering::Relaxed)
    }

    /// Shut down: stop the forwarders, close every book service, and
    /// join all tasks. Idempotent.
    pub async fn close(&self) {
        self.shutdown.cancel();
        for book in self.books.values() {
            book.close().await;
        }
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "market forwarder ended abnormally");
            }
        }
    }

    fn book(&self, instrument_id: InstrumentId) -> Result<&BookService, MarketError> {
        self.books
            .get(&instrument_id)
            .ok_or(MarketError::UnknownInstrument)
    }
}

async fn run_forwarder(
    instrument_id: InstrumentId,
    mut events: mpsc::Receiver<Event>,
    view: Arc<MarketView>,
    consolidated_tx: mpsc::Sender<MarketEvent>,
    drop_events: bool,
    dropped: Arc<AtomicU64>,
    shutdown: CancellationToken,
) {
    debug!(instrument_id, "market forwarder started");
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        view.apply(instrument_id, &event);

        let tagged = MarketEvent {
            instrument_id,
            event,
        };
        if drop_events {
            match consolidated_tx.try_send(tagged) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => {}
            }
        } else {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = consolidated_tx.send(tagged) => {}
            }
        }
    }
    debug!(instrument_id, "market forwarder exiting");
}
