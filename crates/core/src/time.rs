use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, NaiveDate, Utc};

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: f64 = 604_800.0;

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
    /// Shared, manually advanced time. Clones observe the same instant.
    Manual(ManualClock),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a shared manual clock starting at the given timestamp.
    #[must_use]
    pub fn manual(at: DateTime<Utc>) -> Self {
        Self::Manual(ManualClock::new(at))
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Manual(m) => m.now(),
        }
    }

    /// Advance a fixed or manual clock by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::Default => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Manual(m) => m.advance(delta),
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Clock::Default)
    }
}

/// Advanceable time source shared between clones.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += delta;
    }
}

//
// ─── CALENDAR HELPERS ──────────────────────────────────────────────────────────
//

/// Whole days from `earlier` to `later`, floored (negative when reversed).
#[must_use]
pub fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Fractional weeks from `earlier` to `later`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weeks_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_seconds() as f64 / SECONDS_PER_WEEK
}

/// Fractional minutes from `start` to `end`, never negative.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds().max(0) as f64) / 60_000.0
}

/// UTC calendar date of a timestamp.
#[must_use]
pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = Clock::manual(fixed_now());
        let mut other = clock.clone();
        other.advance(Duration::minutes(3));
        assert_eq!(clock.now(), fixed_now() + Duration::minutes(3));
    }

    #[test]
    fn fixed_clock_advances_only_itself() {
        let clock = fixed_clock();
        let mut copy = clock.clone();
        copy.advance(Duration::hours(1));
        assert_eq!(clock.now(), fixed_now());
        assert_eq!(copy.now(), fixed_now() + Duration::hours(1));
    }

    #[test]
    fn whole_days_floor_partial_days() {
        let t = fixed_now();
        assert_eq!(whole_days_between(t, t + Duration::hours(47)), 1);
        assert_eq!(whole_days_between(t, t + Duration::hours(48)), 2);
        assert_eq!(whole_days_between(t, t + Duration::hours(3)), 0);
        assert_eq!(whole_days_between(t + Duration::hours(1), t), -1);
    }

    #[test]
    fn weeks_and_minutes_are_fractional() {
        let t = fixed_now();
        assert!((weeks_between(t, t + Duration::days(21)) - 3.0).abs() < f64::EPSILON);
        assert!((minutes_between(t, t + Duration::seconds(90)) - 1.5).abs() < f64::EPSILON);
        assert!(minutes_between(t, t - Duration::minutes(5)).abs() < f64::EPSILON);
    }
}
