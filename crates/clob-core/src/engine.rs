//! Price-time priority matching engine for one instrument.
//!
//! The engine is a pure function of its own state and the incoming
//! command. Every accepted command returns a report plus the ordered
//! events describing each transition; a rejected command mutates
//! nothing and emits nothing. `DuplicateId` is checked before any
//! matching takes place.

use crate::book::Book;
use crate::error::CoreError;
use crate::events::{Event, OrderRemovedEvent, OrderRestedEvent, RemoveReason};
use crate::order::{Order, OrderId, OrderKind, TimestampNs};
use crate::report::{CancelReport, SubmitReport};

/// Single-instrument matching engine.
#[derive(Debug)]
pub struct Engine {
    book: Book,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    /// Create an engine with an empty book.
    pub fn new() -> Self {
        Engine { book: Book::new() }
    }

    /// Submit a limit order.
    ///
    /// Crosses the opposite side while its best price is acceptable,
    /// then rests any remainder at the order's own price. The returned
    /// events are, in order: one `Trade` per maker consumed, each
    /// followed by that maker's `Reduced` or `Removed(Filled)`, then a
    /// single `Rested` if anything was left over.
    pub fn submit_limit(&mut self, order: Order) -> Result<(SubmitReport, Vec<Event>), CoreError> {
        validate(&order, OrderKind::Limit)?;
        if self.book.contains(order.id) {
            return Err(CoreError::DuplicateId);
        }

        let mut remaining = order.size;
        let mut fills = Vec::new();
        let mut events = Vec::new();
        self.book
            .match_taker(&order, &mut remaining, Some(order.price), &mut fills, &mut events);

        let rested = remaining > 0;
        if rested {
            self.book.insert_resting(&order, remaining);
            events.push(Event::Rested(OrderRestedEvent {
                order_id: order.id,
                user_id: order.user_id,
                side: order.side,
                price: order.price,
                size: remaining,
                time: order.time,
            }));
        }

        Ok((
            SubmitReport {
                order_id: order.id,
                remaining,
                fills,
                rested,
            },
            events,
        ))
    }

    /// Submit a market order.
    ///
    /// Matches greedily with no price limit and never rests; the
    /// report's `remaining` is positive when the opposite side was
    /// exhausted first. `order.price` is ignored.
    pub fn submit_market(&mut self, order: Order) -> Result<(SubmitReport, Vec<Event>), CoreError> {
        validate(&order, OrderKind::Market)?;
        if self.book.contains(order.id) {
            return Err(CoreError::DuplicateId);
        }

        let mut remaining = order.size;
        let mut fills = Vec::new();
        let mut events = Vec::new();
        self.book
            .match_taker(&order, &mut remaining, None, &mut fills, &mut events);

        Ok((
            SubmitReport {
                order_id: order.id,
                remaining,
                fills,
                rested: false,
            },
            events,
        ))
    }

    /// Cancel a resting order, reporting the size it still had.
    pub fn cancel(
        &mut self,
        id: OrderId,
        now: TimestampNs,
    ) -> Result<(CancelReport, Vec<Event>), CoreError> {
        if id == 0 || now <= 0 {
            return Err(CoreError::InvalidOrder);
        }
        let node = self.book.remove(id).ok_or(CoreError::NotFound)?;

        let event = Event::Removed(OrderRemovedEvent {
            order_id: node.id,
            reason: RemoveReason::Canceled,
            remaining: node.size,
            price: node.price,
            side: node.side,
            user_id: node.user_id,
            time: now,
        });
        Ok((
            CancelReport {
                order_id: id,
                canceled_size: node.size,
            },
            vec![event],
        ))
    }
}

fn validate(order: &Order, expected: OrderKind) -> Result<(), CoreError> {
    if order.kind != expected {
        return Err(CoreError::InvalidOrder);
    }
    if order.id == 0 || order.user_id == 0 {
        return Err(CoreError::InvalidOrder);
    }
    if order.size <= 0 {
        return Err(CoreError::InvalidOrder);
    }
    if expected == OrderKind::Limit && order.price <= 0 {
        return Err(CoreError::InvalidOrder);
    }
    if order.time <= 0 {
        return Err(CoreError::InvalidOrder);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::Side;

    fn limit(id: OrderId, user: u64, side: Side, price: i64, size: i64) -> Order {
        Order {
            id,
            user_id: user,
            side,
            kind: OrderKind::Limit,
            price,
            size,
            time: 1_000_000 + id as i64,
        }
    }

    fn market(id: OrderId, user: u64, side: Side, size: i64) -> Order {
        Order {
            id,
            user_id: user,
            side,
            kind: OrderKind::Market,
            price: 0,
            size,
            time: 1_000_000 + id as i64,
        }
    }

    #[test]
    fn limit_rests_on_empty_book() {
        let mut engine = Engine::new();
        let (report, events) = engine.submit_limit(limit(1, 10, Side::Buy, 100, 5)).unwrap();

        assert_eq!(report.order_id, 1);
        assert_eq!(report.remaining, 5);
        assert!(report.rested);
        assert!(report.fills.is_empty());
        assert_eq!(events.len(), 1);
        match events[0] {
            Event::Rested(e) => {
                assert_eq!(e.order_id, 1);
                assert_eq!(e.price, 100);
                assert_eq!(e.size, 5);
            }
            other => panic!("expected Rested, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_id_rejected_before_matching() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Buy, 100, 5)).unwrap();
        // Same id on the opposite side would otherwise cross.
        let err = engine.submit_limit(limit(1, 20, Side::Sell, 100, 5)).unwrap_err();
        assert_eq!(err, CoreError::DuplicateId);
        // Book unchanged: the original bid still cancels for 5.
        let (report, _) = engine.cancel(1, 2_000_000).unwrap();
        assert_eq!(report.canceled_size, 5);
    }

    #[test]
    fn validation_rejections() {
        let mut engine = Engine::new();
        let cases = [
            limit(0, 10, Side::Buy, 100, 5),
            limit(1, 0, Side::Buy, 100, 5),
            limit(1, 10, Side::Buy, 0, 5),
            limit(1, 10, Side::Buy, 100, 0),
            limit(1, 10, Side::Buy, 100, -3),
        ];
        for order in cases {
            assert_eq!(engine.submit_limit(order).unwrap_err(), CoreError::InvalidOrder);
        }

        let mut bad_time = limit(1, 10, Side::Buy, 100, 5);
        bad_time.time = 0;
        assert_eq!(engine.submit_limit(bad_time).unwrap_err(), CoreError::InvalidOrder);

        // Kind mismatch on either entry point.
        assert_eq!(
            engine.submit_market(limit(1, 10, Side::Buy, 100, 5)).unwrap_err(),
            CoreError::InvalidOrder
        );
        assert_eq!(
            engine.submit_limit(market(1, 10, Side::Buy, 5)).unwrap_err(),
            CoreError::InvalidOrder
        );
    }

    #[test]
    fn partial_fill_emits_trade_then_reduced() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Sell, 101, 3)).unwrap();
        let (report, events) = engine.submit_limit(limit(2, 20, Side::Buy, 102, 2)).unwrap();

        assert_eq!(report.remaining, 0);
        assert!(!report.rested);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].maker_order_id, 1);
        assert_eq!(report.fills[0].price, 101);
        assert_eq!(report.fills[0].size, 2);

        assert_eq!(events.len(), 2);
        match events[0] {
            Event::Trade(t) => {
                assert_eq!(t.price, 101);
                assert_eq!(t.size, 2);
                assert_eq!(t.taker_side, Side::Buy);
                assert_eq!(t.taker_order_id, 2);
                assert_eq!(t.maker_order_id, 1);
            }
            other => panic!("expected Trade, got {other:?}"),
        }
        match events[1] {
            Event::Reduced(r) => {
                assert_eq!(r.order_id, 1);
                assert_eq!(r.delta, -2);
                assert_eq!(r.remaining, 1);
            }
            other => panic!("expected Reduced, got {other:?}"),
        }
    }

    #[test]
    fn full_fill_emits_trade_then_removed() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Sell, 101, 2)).unwrap();
        let (report, events) = engine.submit_limit(limit(2, 20, Side::Buy, 101, 2)).unwrap();

        assert_eq!(report.remaining, 0);
        assert_eq!(events.len(), 2);
        match events[1] {
            Event::Removed(r) => {
                assert_eq!(r.order_id, 1);
                assert_eq!(r.reason, RemoveReason::Filled);
                assert_eq!(r.remaining, 0);
            }
            other => panic!("expected Removed, got {other:?}"),
        }
        // Maker id is free again.
        assert_eq!(engine.cancel(1, 2_000_000).unwrap_err(), CoreError::NotFound);
    }

    #[test]
    fn limit_stops_at_its_price_and_rests_remainder() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Sell, 101, 1)).unwrap();
        engine.submit_limit(limit(2, 10, Side::Sell, 103, 1)).unwrap();

        let (report, events) = engine.submit_limit(limit(3, 20, Side::Buy, 102, 5)).unwrap();
        assert_eq!(report.remaining, 4);
        assert!(report.rested);
        assert_eq!(report.fills.len(), 1);

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Event::Trade(t) if t.price == 101 && t.size == 1));
        assert!(matches!(
            events[1],
            Event::Removed(r) if r.order_id == 1 && r.reason == RemoveReason::Filled
        ));
        assert!(matches!(
            events[2],
            Event::Rested(r) if r.order_id == 3 && r.price == 102 && r.size == 4
        ));
    }

    #[test]
    fn market_sweeps_levels_in_fifo_order() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Sell, 100, 2)).unwrap();
        engine.submit_limit(limit(2, 11, Side::Sell, 100, 2)).unwrap();

        let (report, events) = engine.submit_market(market(3, 20, Side::Buy, 3)).unwrap();
        assert_eq!(report.remaining, 0);
        assert_eq!(report.fills.len(), 2);
        assert_eq!(report.fills[0].maker_order_id, 1);
        assert_eq!(report.fills[1].maker_order_id, 2);

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Event::Trade(t) if t.maker_order_id == 1 && t.size == 2));
        assert!(matches!(events[1], Event::Removed(r) if r.order_id == 1));
        assert!(matches!(events[2], Event::Trade(t) if t.maker_order_id == 2 && t.size == 1));
        assert!(matches!(
            events[3],
            Event::Reduced(r) if r.order_id == 2 && r.delta == -1 && r.remaining == 1
        ));
    }

    #[test]
    fn market_on_empty_book_is_a_noop() {
        let mut engine = Engine::new();
        let (report, events) = engine.submit_market(market(1, 10, Side::Buy, 5)).unwrap();
        assert_eq!(report.remaining, 5);
        assert!(report.fills.is_empty());
        assert!(!report.rested);
        assert!(events.is_empty());
    }

    #[test]
    fn market_never_rests_when_side_exhausted() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Sell, 100, 2)).unwrap();
        let (report, _) = engine.submit_market(market(2, 20, Side::Buy, 5)).unwrap();
        assert_eq!(report.remaining, 3);
        assert!(!report.rested);
        // The market order's id must not be resident.
        assert_eq!(engine.cancel(2, 2_000_000).unwrap_err(), CoreError::NotFound);
    }

    #[test]
    fn cancel_reports_remaining_at_cancel_time() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Buy, 100, 3)).unwrap();
        engine.submit_limit(limit(2, 11, Side::Buy, 100, 2)).unwrap();

        let (report, events) = engine.cancel(1, 5_000_000).unwrap();
        assert_eq!(report.order_id, 1);
        assert_eq!(report.canceled_size, 3);
        assert_eq!(events.len(), 1);
        match events[0] {
            Event::Removed(r) => {
                assert_eq!(r.reason, RemoveReason::Canceled);
                assert_eq!(r.remaining, 3);
                assert_eq!(r.time, 5_000_000);
                assert_eq!(r.price, 100);
                assert_eq!(r.side, Side::Buy);
            }
            other => panic!("expected Removed, got {other:?}"),
        }

        // The other order at the level is untouched.
        let (second, _) = engine.cancel(2, 6_000_000).unwrap();
        assert_eq!(second.canceled_size, 2);
    }

    #[test]
    fn cancel_unknown_id_is_an_error() {
        let mut engine = Engine::new();
        assert_eq!(engine.cancel(42, 1_000).unwrap_err(), CoreError::NotFound);
    }

    #[test]
    fn partially_filled_maker_cancels_for_its_remainder() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Sell, 100, 10)).unwrap();
        engine.submit_market(market(2, 20, Side::Buy, 4)).unwrap();

        let (report, events) = engine.cancel(1, 9_000_000).unwrap();
        assert_eq!(report.canceled_size, 6);
        assert!(matches!(
            events[0],
            Event::Removed(r) if r.remaining == 6 && r.reason == RemoveReason::Canceled
        ));
    }

    #[test]
    fn fill_sizes_reconcile_with_trades_and_remaining() {
        let mut engine = Engine::new();
        engine.submit_limit(limit(1, 10, Side::Sell, 100, 3)).unwrap();
        engine.submit_limit(limit(2, 11, Side::Sell, 101, 4)).unwrap();

        let (report, events) = engine.submit_limit(limit(3, 20, Side::Buy, 101, 9)).unwrap();
        let filled: i64 = report.fills.iter().map(|f| f.size).sum();
        let traded: i64 = events
            .iter()
            .filter_map(|e| match e {
                Event::Trade(t) => Some(t.size),
                _ => None,
            })
            .sum();
        assert_eq!(filled, traded);
        assert_eq!(filled, 9 - report.remaining);
        assert_eq!(report.remaining, 2);
    }
}
