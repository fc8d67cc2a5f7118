//! Wall-clock abstraction.
//!
//! Rate limits are absolute timestamps, so every decision in the transport
//! reads "now" through a `Clock`. Production uses `SystemClock`; tests inject
//! a `ManualClock` and move it forward explicitly.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// pass another into the transport.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Creates a clock frozen at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { millis: Arc::new(AtomicI64::new(start.timestamp_millis())) }
    }

    /// Moves the clock forward by `duration`.
    ///
    /// Saturates at the latest instant `chrono` can represent.
    pub fn advance(&self, duration: Duration) {
        let step = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let ceiling = DateTime::<Utc>::MAX_UTC.timestamp_millis();

        let _ = self.millis.fetch_update(Ordering::AcqRel, Ordering::Acquire, |millis| {
            Some(millis.saturating_add(step).min(ceiling))
        });
    }

    /// Jumps the clock to `time`.
    pub fn set(&self, time: DateTime<Utc>) {
        self.millis.store(time.timestamp_millis(), Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_shared_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        let handle = clock.clone();

        handle.advance(Duration::from_secs(90));

        assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
    }

    #[test]
    fn manual_clock_can_jump() {
        let clock = ManualClock::new();
        let target = Utc.with_ymd_and_hms(2030, 6, 15, 12, 0, 0).unwrap();

        clock.set(target);

        assert_eq!(clock.now(), target);
    }

    #[test]
    fn huge_advance_saturates_instead_of_wrapping() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);

        clock.advance(Duration::MAX);
        let saturated = clock.now();
        clock.advance(Duration::MAX);

        assert!(saturated > start);
        assert_eq!(clock.now(), saturated);
        assert_eq!(saturated.timestamp_millis(), DateTime::<Utc>::MAX_UTC.timestamp_millis());
    }
}
