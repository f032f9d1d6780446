//! Per-store monotonic timestamp source.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hands out epoch-millisecond stamps that strictly increase per instance.
///
/// Each stamp is `max(wall_clock_ms, previous + 1)`, so two writes through
/// the same store never share an `updated_at`, even within one millisecond
/// or across a backwards wall-clock step.
#[derive(Debug, Default)]
pub struct NoteClock {
    last: AtomicI64,
}

impl NoteClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> i64 {
        let now = wall_clock_ms();
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
