//! Injectable time source.
//!
//! Timestamps on delivered records come from a [`Clock`] handed to the
//! translator, never from ambient process state, so tests can pin them.

use chrono::{DateTime, Utc};

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

/// Source of the current instant.
///
/// Any `Fn() -> DateTime<Utc>` closure is a clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Milliseconds since the Unix epoch, truncated from the nanosecond value.
///
/// Instants outside the range representable in `i64` nanoseconds
/// (roughly years 1677 to 2262) fall back to chrono's millisecond value.
pub fn unix_millis(instant: DateTime<Utc>) -> i64 {
    match instant.timestamp_nanos_opt() {
        Some(nanos) => nanos / 1_000_000,
        None => instant.timestamp_millis(),
    }
}
