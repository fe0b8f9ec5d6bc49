// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic clock reads.

use parallax_core::time::Timestamp;
use rustix::time::{ClockId, Timespec, clock_gettime};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Returns the current `CLOCK_MONOTONIC` time.
#[must_use]
pub fn now() -> Timestamp {
    timespec_to_timestamp(clock_gettime(ClockId::Monotonic))
}

fn timespec_to_timestamp(timespec: Timespec) -> Timestamp {
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(999_999_999);

    let total = u128::from(seconds)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(u128::from(nanos));
    Timestamp(u64::try_from(total).unwrap_or(u64::MAX))
}
