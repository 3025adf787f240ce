//! Single-writer service around one engine and its view.
//!
//! Two long-lived tasks per service:
//! - the **worker** owns the [`Engine`], pulls commands off a bounded
//!   queue, stamps ids and times, and pushes every resulting event
//!   onto the internal channel before signaling the reply;
//! - the **dispatcher** owns view writes: it consumes the internal
//!   channel, applies each event to the [`BookView`], then offers the
//!   event on the external subscriber channel.
//!
//! The internal channel is authoritative and never drops; when it
//! fills, the worker stalls, which is the intended back-pressure. A
//! slow external subscriber therefore delays publication only, never
//! the view.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use clob_core::{
    CancelReport, Engine, Event, Order, OrderId, OrderKind, PriceTicks, Side, Size, SubmitReport,
    TradeEvent, UserId,
};

use crate::clock;
use crate::config::BookConfig;
use crate::error::ServiceError;
use crate::view::{BookView, Level, RestingOrder};

enum Command {
    SubmitLimit {
        user_id: UserId,
        side: Side,
        price: PriceTicks,
        size: Size,
        reply: oneshot::Sender<Result<SubmitReport, ServiceError>>,
    },
    SubmitMarket {
        user_id: UserId,
        side: Side,
        size: Size,
        reply: oneshot::Sender<Result<SubmitReport, ServiceError>>,
    },
    Cancel {
        order_id: OrderId,
        reply: oneshot::Sender<Result<CancelReport, ServiceError>>,
    },
}

/// Concurrent facade over one instrument's engine and view.
#[derive(Debug)]
pub struct BookService {
    view: Arc<BookView>,
    cmd_tx: mpsc::Sender<Command>,
    external_rx: Mutex<Option<mpsc::Receiver<Event>>>,
    dropped_external: Arc<AtomicU64>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BookService {
    /// Start a service with a fresh, empty book. Must be called from
    /// within a tokio runtime; spawns the worker and dispatcher tasks.
    pub fn new(cfg: BookConfig) -> Self {
        let cfg = cfg.normalized();

        let (cmd_tx, cmd_rx) = mpsc::channel(cfg.command_queue_capacity);
        let (internal_tx, internal_rx) = mpsc::channel(cfg.internal_event_capacity);
        let (external_tx, external_rx) = mpsc::channel(cfg.external_event_capacity);

        let view = Arc::new(BookView::new(cfg.trade_tape_capacity));
        let dropped_external = Arc::new(AtomicU64::new(0));
        let shutdown = CancellationToken::new();

        // Seed the id counter from the clock so restarts do not
        // reuse ids.
        let id_seq = AtomicU64::new(clock::monotonic_ns() as u64);

        let worker = tokio::spawn(run_worker(
            Engine::new(),
            cmd_rx,
            internal_tx,
            id_seq,
            shutdown.clone(),
        ));
        let dispatcher = tokio::spawn(run_dispatcher(
            internal_rx,
            external_tx,
            view.clone(),
            cfg.drop_external_events,
            dropped_external.clone(),
            shutdown.clone(),
        ));

        BookService {
            view,
            cmd_tx,
            external_rx: Mutex::new(Some(external_rx)),
            dropped_external,
            shutdown,
            tasks: Mutex::new(vec![worker, dispatcher]),
        }
    }

    /// Submit a limit order. Id and timestamp are assigned when the
    /// worker dequeues the command.
    pub async fn submit_limit(
        &self,
        ctx: &CancellationToken,
        user_id: UserId,
        side: Side,
        price: PriceTicks,
        size: Size,
    ) -> Result<SubmitReport, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(
            ctx,
            Command::SubmitLimit {
                user_id,
                side,
                price,
                size,
                reply: reply_tx,
            },
        )
        .await?;
        self.await_reply(ctx, reply_rx).await
    }

    /// Submit a market order.
    pub async fn submit_market(
        &self,
        ctx: &CancellationToken,
        user_id: UserId,
        side: Side,
        size: Size,
    ) -> Result<SubmitReport, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(
            ctx,
            Command::SubmitMarket {
                user_id,
                side,
                size,
                reply: reply_tx,
            },
        )
        .await?;
        self.await_reply(ctx, reply_rx).await
    }

    /// Cancel a resting order. The cancel timestamp is taken when the
    /// worker dequeues the command.
    pub async fn cancel(
        &self,
        ctx: &CancellationToken,
        order_id: OrderId,
    ) -> Result<CancelReport, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(
            ctx,
            Command::Cancel {
                order_id,
                reply: reply_tx,
            },
        )
        .await?;
        self.await_reply(ctx, reply_rx).await
    }

    /// Aggregate levels for a side, best first (view snapshot).
    pub fn levels(&self, side: Side) -> Vec<Level> {
        self.view.levels(side)
    }

    /// Best level of a side, if any (view snapshot).
    pub fn best(&self, side: Side) -> Option<Level> {
        self.view.best(side)
    }

    /// Resting orders for a side (view snapshot).
    pub fn orders(&self, side: Side) -> Vec<RestingOrder> {
        self.view.orders(side)
    }

    /// The last `n` trades in chronological order (view snapshot).
    pub fn trades_last(&self, n: usize) -> Vec<TradeEvent> {
        self.view.trades_last(n)
    }

    /// Take the external event stream. The stream is single-consumer;
    /// this returns `Some` exactly once.
    pub fn events(&self) -> Option<mpsc::Receiver<Event>> {
        self.external_rx.lock().take()
    }

    /// Number of events dropped from the external channel so far.
    pub fn dropped_external_events(&self) -> u64 {
        self.dropped_external.load(Ordering::Relaxed)
    }

    /// Shut the service down: stop accepting commands, let the
    /// dispatcher drain the internal channel, and join both tasks.
    /// Idempotent.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "orderbook task ended abnormally");
            }
        }
    }

    async fn enqueue(&self, ctx: &CancellationToken, cmd: Command) -> Result<(), ServiceError> {
        if self.shutdown.is_cancelled() {
            return Err(ServiceError::Closed);
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(ServiceError::Closed),
            _ = ctx.cancelled() => Err(ServiceError::Canceled),
            permit = self.cmd_tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(cmd);
                    Ok(())
                }
                Err(_) => Err(ServiceError::Closed),
            },
        }
    }

    async fn await_reply<T>(
        &self,
        ctx: &CancellationToken,
        reply_rx: oneshot::Receiver<Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(ServiceError::Closed),
            _ = ctx.cancelled() => Err(ServiceError::Canceled),
            reply = reply_rx => reply.unwrap_or(Err(ServiceError::Closed)),
        }
    }
}

async fn run_worker(
    mut engine: Engine,
    mut cmd_rx: mpsc::Receiver<Command>,
    internal_tx: mpsc::Sender<Event>,
    id_seq: AtomicU64,
    shutdown: CancellationToken,
) {
    debug!("orderbook worker started");
    loop {
        let cmd = tokio::select! {
            _ = shutdown.cancelled() => break,
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };

        match cmd {
            Command::SubmitLimit {
                user_id,
                side,
                price,
                size,
                reply,
            } => {
                let order = Order {
                    id: id_seq.fetch_add(1, Ordering::Relaxed),
                    user_id,
                    side,
                    kind: OrderKind::Limit,
                    price,
                    size,
                    time: clock::monotonic_ns(),
                };
                match engine.submit_limit(order) {
                    Ok((report, events)) => {
                        forward_events(&internal_tx, events).await;
                        let _ = reply.send(Ok(report));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err.into()));
                    }
                }
            }

            Command::SubmitMarket {
                user_id,
                side,
                size,
                reply,
            } => {
                let order = Order {
                    id: id_seq.fetch_add(1, Ordering::Relaxed),
                    user_id,
                    side,
                    kind: OrderKind::Market,
                    price: 0,
                    size,
                    time: clock::monotonic_ns(),
                };
                match engine.submit_market(order) {
                    Ok((report, events)) => {
                        forward_events(&internal_tx, events).await;
                        let _ = reply.send(Ok(report));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err.into()));
                    }
                }
            }

            Command::Cancel { order_id, reply } => {
                match engine.cancel(order_id, clock::monotonic_ns()) {
                    Ok((report, events)) => {
                        forward_events(&internal_tx, events).await;
                        let _ = reply.send(Ok(report));
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err.into()));
                    }
                }
            }
        }
    }
    debug!("orderbook worker exiting");
    // Dropping internal_tx here closes the authoritative channel; the
    // dispatcher drains whatever is buffered and then exits.
}

async fn run_dispatcher(
    mut internal_rx: mpsc::Receiver<Event>,
    external_tx: mpsc::Sender<Event>,
    view: Arc<BookView>,
    drop_external: bool,
    dropped: Arc<AtomicU64>,
    shutdown: CancellationToken,
) {
    debug!("orderbook dispatcher started");
    while let Some(event) = internal_rx.recv().await {
        // The view is updated first, in event order, unconditionally.
        view.apply(&event);

        if drop_external {
            match external_tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => {}
            }
        } else if !shutdown.is_cancelled() {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = external_tx.send(event) => {}
            }
        }
    }
    debug!("orderbook dispatcher exiting");
    // Dropping external_tx closes the subscriber stream.
}

async fn forward_events(internal_tx: &mpsc::Sender<Event>, events: Vec<Event>) {
    for event in events {
        // The authoritative channel never drops; a full buffer
        // throttles the worker instead.
        if internal_tx.send(event).await.is_err() {
            return;
        }
    }
}
