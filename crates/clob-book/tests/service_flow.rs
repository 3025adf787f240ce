// crates/clob-book/tests/service_flow.rs
//
// Service-level behavior: command pipeline, view freshness, event
// fan-out, cancellation, and shutdown.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use clob_book::{BookConfig, BookService, ServiceError};
use clob_core::{CoreError, Event, Side};

const WAIT: Duration = Duration::from_millis(200);

#[tokio::test]
async fn submit_limit_updates_view() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();
    let mut events = svc.events().expect("first take");

    let report = svc.submit_limit(&ctx, 1, Side::Buy, 100, 10).await.unwrap();
    assert_eq!(report.remaining, 10);
    assert!(report.rested);

    // The dispatcher applies to the view before publishing, so once
    // the event arrives the view must already contain the order.
    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(event, Event::Rested(r) if r.order_id == report.order_id));

    let levels = svc.levels(Side::Buy);
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].price, 100);
    assert_eq!(levels[0].size, 10);
    assert_eq!(svc.best(Side::Buy).map(|l| l.price), Some(100));

    svc.close().await;
}

#[tokio::test]
async fn events_stream_is_single_consumer() {
    let svc = BookService::new(BookConfig::default());
    assert!(svc.events().is_some());
    assert!(svc.events().is_none());
    svc.close().await;
}

#[tokio::test]
async fn concurrent_submits_all_land_in_view() {
    let svc = std::sync::Arc::new(BookService::new(BookConfig::default()));
    let ctx = CancellationToken::new();
    let mut events = svc.events().expect("events");

    let num_orders = 100usize;
    let mut joins = Vec::new();
    for i in 0..num_orders {
        let svc = svc.clone();
        let ctx = ctx.clone();
        joins.push(tokio::spawn(async move {
            let price = 100 + (i % 10) as i64;
            svc.submit_limit(&ctx, (i + 1) as u64, Side::Buy, price, 1)
                .await
                .unwrap();
        }));
    }
    for join in joins {
        join.await.unwrap();
    }

    // Drain one Rested event per order so the view is known current.
    let mut rested = 0;
    while rested < num_orders {
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        if matches!(event, Event::Rested(_)) {
            rested += 1;
        }
    }

    assert_eq!(svc.orders(Side::Buy).len(), num_orders);
    let total: i64 = svc.levels(Side::Buy).iter().map(|l| l.size).sum();
    assert_eq!(total, num_orders as i64);

    svc.close().await;
}

#[tokio::test]
async fn cancel_clears_view_and_reports_remaining() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();
    let mut events = svc.events().expect("events");

    let report = svc.submit_limit(&ctx, 1, Side::Buy, 100, 10).await.unwrap();
    let _ = timeout(WAIT, events.recv()).await.unwrap().unwrap();

    let cancel = svc.cancel(&ctx, report.order_id).await.unwrap();
    assert_eq!(cancel.canceled_size, 10);

    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(event, Event::Removed(_)));
    assert!(svc.orders(Side::Buy).is_empty());
    assert!(svc.levels(Side::Buy).is_empty());

    svc.close().await;
}

#[tokio::test]
async fn core_errors_surface_verbatim() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();

    let err = svc.submit_limit(&ctx, 1, Side::Buy, 100, 0).await.unwrap_err();
    assert_eq!(err, ServiceError::Core(CoreError::InvalidOrder));

    let err = svc.cancel(&ctx, 424242).await.unwrap_err();
    assert_eq!(err, ServiceError::Core(CoreError::NotFound));

    svc.close().await;
}

#[tokio::test]
async fn trades_flow_to_tape_in_order() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();
    let mut events = svc.events().expect("events");

    svc.submit_limit(&ctx, 1, Side::Sell, 100, 10).await.unwrap();
    let report = svc.submit_market(&ctx, 2, Side::Buy, 4).await.unwrap();
    assert_eq!(report.remaining, 0);
    assert_eq!(report.fills.len(), 1);

    // Rested, then Trade, then Reduced.
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(timeout(WAIT, events.recv()).await.unwrap().unwrap());
    }
    assert!(matches!(seen[0], Event::Rested(_)));
    assert!(matches!(seen[1], Event::Trade(t) if t.size == 4 && t.price == 100));
    assert!(matches!(seen[2], Event::Reduced(r) if r.remaining == 6));

    let trades = svc.trades_last(10);
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].size, 4);

    svc.close().await;
}

#[tokio::test]
async fn command_order_equals_event_order() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();
    let mut events = svc.events().expect("events");

    let mut submitted = Vec::new();
    for i in 0..10 {
        let report = svc
            .submit_limit(&ctx, 1, Side::Buy, 100 - i, 1)
            .await
            .unwrap();
        submitted.push(report.order_id);
    }

    let mut observed = Vec::new();
    while observed.len() < submitted.len() {
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        if let Event::Rested(r) = event {
            observed.push(r.order_id);
        }
    }
    assert_eq!(observed, submitted);

    svc.close().await;
}

#[tokio::test]
async fn precancelled_token_prevents_execution() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = svc.submit_limit(&ctx, 1, Side::Buy, 100, 10).await.unwrap_err();
    assert_eq!(err, ServiceError::Canceled);

    sleep(Duration::from_millis(50)).await;
    assert!(svc.orders(Side::Buy).is_empty());

    svc.close().await;
}

#[tokio::test]
async fn closed_service_rejects_commands() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();

    svc.close().await;
    let err = svc.submit_limit(&ctx, 1, Side::Buy, 100, 10).await.unwrap_err();
    assert_eq!(err, ServiceError::Closed);

    // Close is idempotent.
    svc.close().await;
}

#[tokio::test]
async fn external_overflow_drops_and_counts() {
    let cfg = BookConfig {
        external_event_capacity: 1,
        ..BookConfig::default()
    };
    let svc = BookService::new(cfg);
    let ctx = CancellationToken::new();

    // Nobody reads the external stream; capacity 1 holds the first
    // Rested event and the next two must be dropped and counted.
    for i in 0..3 {
        svc.submit_limit(&ctx, 1, Side::Buy, 100 + i, 1).await.unwrap();
    }
    sleep(Duration::from_millis(100)).await;

    assert_eq!(svc.dropped_external_events(), 2);
    // The view saw everything regardless.
    assert_eq!(svc.levels(Side::Buy).len(), 3);

    svc.close().await;
}

#[tokio::test]
async fn blocking_policy_loses_nothing() {
    let cfg = BookConfig {
        external_event_capacity: 1,
        drop_external_events: false,
        ..BookConfig::default()
    };
    let svc = BookService::new(cfg);
    let ctx = CancellationToken::new();
    let mut events = svc.events().expect("events");

    for i in 0..5 {
        svc.submit_limit(&ctx, 1, Side::Buy, 100 + i, 1).await.unwrap();
    }

    let mut rested = 0;
    while rested < 5 {
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        if matches!(event, Event::Rested(_)) {
            rested += 1;
        }
    }
    assert_eq!(svc.dropped_external_events(), 0);

    svc.close().await;
}

#[tokio::test]
async fn view_replay_from_event_log_matches_service_view() {
    let svc = BookService::new(BookConfig::default());
    let ctx = CancellationToken::new();
    let mut events = svc.events().expect("events");

    svc.submit_limit(&ctx, 1, Side::Sell, 101, 3).await.unwrap();
    svc.submit_limit(&ctx, 2, Side::Sell, 102, 4).await.unwrap();
    let crossing = svc.submit_limit(&ctx, 3, Side::Buy, 101, 5).await.unwrap();
    assert_eq!(crossing.remaining, 2);

    // 2 Rested + (Trade, Removed, Rested) from the cross.
    let mut log = Vec::new();
    for _ in 0..5 {
        log.push(timeout(WAIT, events.recv()).await.unwrap().unwrap());
    }

    let replay = clob_book::BookView::new(16);
    for event in &log {
        replay.apply(event);
    }
    assert_eq!(replay.levels(Side::Buy), svc.levels(Side::Buy));
    assert_eq!(replay.levels(Side::Sell), svc.levels(Side::Sell));
    assert_eq!(replay.orders(Side::Buy), svc.orders(Side::Buy));
    assert_eq!(replay.orders(Side::Sell), svc.orders(Side::Sell));
    assert_eq!(replay.trades_last(10), svc.trades_last(10));

    svc.close().await;
}
