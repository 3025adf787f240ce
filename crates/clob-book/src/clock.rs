//! Monotonic nanosecond clock for order and cancel timestamps.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clob_core::TimestampNs;

static BASE: OnceLock<(Instant, i64)> = OnceLock::new();

/// Nanoseconds on a monotonic clock anchored to the wall clock at
/// first use. Successive readings never decrease within a process.
pub fn monotonic_ns() -> TimestampNs {
    let (start, wall_base) = *BASE.get_or_init(|| {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (Instant::now(), wall.as_nanos() as i64)
    });
    wall_base.saturating_add(start.elapsed().as_nanos() as i64)
}
