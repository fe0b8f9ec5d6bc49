// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic timestamps in nanoseconds.
//!
//! [`Timestamp`] is a point on the system's monotonic clock. Durations use
//! [`core::time::Duration`], so `Timestamp + Duration` and
//! `Timestamp - Timestamp` behave like their std counterparts.

use core::fmt;
use core::ops::{Add, Sub};
use core::time::Duration;

/// One millisecond, the threshold used by frame-lag checks.
pub const MILLISECOND: Duration = Duration::from_millis(1);

/// A point in time on the monotonic clock, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The zero timestamp.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from nanoseconds.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Checked addition of a duration.
    #[inline]
    #[must_use]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        let nanos = u64::try_from(duration.as_nanos()).ok()?;
        self.0.checked_add(nanos).map(Self)
    }

    /// Subtraction of a duration, clamped at zero.
    #[inline]
    #[must_use]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_sub(nanos))
    }

    /// Returns this timestamp in (fractional) milliseconds.
    #[inline]
    #[must_use]
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        self.checked_add(rhs).unwrap_or(Self(u64::MAX))
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Duration) -> Self {
        self.saturating_sub(rhs)
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Scales a duration by a float factor, saturating on overflow.
#[must_use]
pub fn scale_duration(duration: Duration, factor: f64) -> Duration {
    let secs = duration.as_secs_f64() * factor;
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_duration() {
        let t = Timestamp(1_000);
        assert_eq!(t + Duration::from_nanos(500), Timestamp(1_500));
        assert_eq!(t - Duration::from_nanos(400), Timestamp(600));
    }

    #[test]
    fn sub_saturates_at_zero() {
        let t = Timestamp(10);
        assert_eq!(t - Duration::from_nanos(20), Timestamp::ZERO);
        assert_eq!(Timestamp(5) - Timestamp(10), Duration::ZERO);
    }

    #[test]
    fn add_saturates_at_max() {
        let t = Timestamp(u64::MAX - 1);
        assert_eq!(t + Duration::from_nanos(10), Timestamp(u64::MAX));
        assert_eq!(t.checked_add(Duration::from_nanos(10)), None);
    }

    #[test]
    fn millis_conversion() {
        let t = Timestamp(2_500_000);
        assert!((t.as_millis_f64() - 2.5).abs() < 1e-9, "2.5 ms expected");
    }

    #[test]
    fn scale_two_and_a_half() {
        let interval = Duration::from_millis(10);
        assert_eq!(scale_duration(interval, 2.5), Duration::from_millis(25));
    }

    #[test]
    fn debug_format() {
        let s = alloc::format!("{:?}", Timestamp(42));
        assert_eq!(s, "Timestamp(42)");
    }
}
