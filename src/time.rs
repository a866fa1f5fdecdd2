//! Microsecond-resolution timestamps for deadline accounting.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point in time stored as microseconds since the Unix epoch.
///
/// Arithmetic is expressed in milliseconds, matching the original
/// `TimeStamp`, which stores microseconds internally but exposes
/// millisecond-granularity `+`/`-` operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeStamp {
    micros: i64,
}

impl TimeStamp {
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            micros: dur.as_micros() as i64,
        }
    }

    pub fn as_micros(self) -> i64 {
        self.micros
    }

    pub fn as_millis(self) -> i64 {
        self.micros / 1_000
    }

    /// Milliseconds elapsed between `self` and `other` (`other - self`).
    pub fn diff_millis(self, other: TimeStamp) -> i64 {
        (other.micros - self.micros) / 1_000
    }

    pub fn add_millis(self, ms: i64) -> TimeStamp {
        TimeStamp {
            micros: self.micros + ms * 1_000,
        }
    }

    pub fn sub_millis(self, ms: i64) -> TimeStamp {
        self.add_millis(-ms)
    }
}

impl std::ops::Add<Duration> for TimeStamp {
    type Output = TimeStamp;
    fn add(self, rhs: Duration) -> TimeStamp {
        self.add_millis(rhs.as_millis() as i64)
    }
}

impl std::ops::Sub<Duration> for TimeStamp {
    type Output = TimeStamp;
    fn sub(self, rhs: Duration) -> TimeStamp {
        self.sub_millis(rhs.as_millis() as i64)
    }
}

/// Remaining time, in milliseconds, until `deadline`; zero if already past.
pub fn remaining_millis(deadline: TimeStamp) -> i64 {
    let now = TimeStamp::now();
    (now.diff_millis(deadline)).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_roundtrip_through_micros() {
        let t = TimeStamp::from_micros(1_500_000);
        assert_eq!(t.as_millis(), 1_500);
    }

    #[test]
    fn diff_and_add_are_inverse() {
        let a = TimeStamp::from_micros(0);
        let b = a.add_millis(250);
        assert_eq!(a.diff_millis(b), 250);
    }

    #[test]
    fn remaining_is_clamped_to_zero_past_deadline() {
        let past = TimeStamp::now().sub_millis(1_000);
        assert_eq!(remaining_millis(past), 0);
    }
}
