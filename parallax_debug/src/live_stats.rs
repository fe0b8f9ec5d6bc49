// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rolling frame statistics.
//!
//! [`LiveStats`] collects up to [`LIVE_STATS_CAPACITY`] durations and reduces
//! them to median, mean and worst on demand, resetting the set each time.
//! [`LiveStatsSink`] feeds one [`LiveStats`] per frame stage from the
//! renderer's trace events and prints them as a fixed-width table:
//!
//! ```text
//!             name          median            mean           worst
//!              cpu         1.250ms         1.301ms         2.004ms
//! ```

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use parallax_core::frame::FrameId;
use parallax_core::pacing::TimingPoint;
use parallax_core::time::Timestamp;
use parallax_core::trace::{FrameLagEvent, GpuTimingEvent, TimingPointEvent, TraceSink};

/// Samples kept per [`LiveStats`] between reads.
pub const LIVE_STATS_CAPACITY: usize = 1024;

/// Column header matching [`LiveStats::print_and_reset`].
pub const HEADER: &str = "            name          median            mean           worst";

/// Reduced statistics, in nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Middle value of the sorted samples.
    pub median: u64,
    /// Mean of the samples.
    pub mean: u64,
    /// Largest sample.
    pub worst: u64,
}

/// A named, fixed-capacity set of nanosecond samples.
#[derive(Clone, Debug)]
pub struct LiveStats {
    name: String,
    values: Vec<u64>,
}

impl LiveStats {
    /// Creates an empty set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::with_capacity(LIVE_STATS_CAPACITY),
        }
    }

    /// Name printed in the first column.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of samples since the last reset.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no samples were added since the last reset.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Adds a sample. Returns `false` and drops it when the set is full.
    pub fn add_ns(&mut self, value: u64) -> bool {
        if self.values.len() >= LIVE_STATS_CAPACITY {
            return false;
        }
        self.values.push(value);
        true
    }

    /// Adds a duration sample, saturating at `u64::MAX` nanoseconds.
    pub fn add(&mut self, value: Duration) -> bool {
        self.add_ns(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Reduces the samples and clears the set.
    ///
    /// An empty set reports all zeroes. The mean sums `value / count` per
    /// sample, so it never overflows.
    pub fn get_and_reset(&mut self) -> Summary {
        let count = self.values.len();
        if count == 0 {
            return Summary::default();
        }

        self.values.sort_unstable();
        let worst = self.values[count - 1];
        let median = self.values[count / 2];
        let divisor = u64::try_from(count).unwrap_or(u64::MAX);
        let mean = self.values.iter().map(|v| v / divisor).sum();

        self.values.clear();
        Summary {
            median,
            mean,
            worst,
        }
    }

    /// Writes one table row and clears the set.
    pub fn print_and_reset(&mut self, out: &mut impl Write) -> fmt::Result {
        let summary = self.get_and_reset();
        write!(out, "{:>16}", self.name)?;
        for ns in [summary.median, summary.mean, summary.worst] {
            write_padded_ms(out, ns)?;
        }
        Ok(())
    }
}

/// Writes ` ####.###ms`, right aligned to 16 columns.
fn write_padded_ms(out: &mut impl Write, ns: u64) -> fmt::Result {
    let ms = ns as f64 / 1_000_000.0;
    write!(out, " {ms:>13.3}ms")
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Per-stage statistics fed by trace events.
#[derive(Debug)]
struct Stages {
    cpu: LiveStats,
    submit: LiveStats,
    gpu: LiveStats,
    lag: LiveStats,
    begun: HashMap<FrameId, Timestamp>,
    submitting: HashMap<FrameId, Timestamp>,
}

impl Stages {
    fn all_mut(&mut self) -> [&mut LiveStats; 4] {
        [&mut self.cpu, &mut self.submit, &mut self.gpu, &mut self.lag]
    }
}

/// A [`TraceSink`] tracking CPU, submit, GPU and lag times.
///
/// - `cpu`: [`TimingPoint::Begin`] to [`TimingPoint::SubmitBegin`].
/// - `submit`: [`TimingPoint::SubmitBegin`] to [`TimingPoint::SubmitEnd`].
/// - `gpu`: GPU execution time of each frame.
/// - `lag`: how late each late frame was presented.
///
/// Clones share their statistics, so one clone can go to the renderer while
/// another prints.
#[derive(Clone, Debug)]
pub struct LiveStatsSink {
    stages: Arc<Mutex<Stages>>,
}

impl Default for LiveStatsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveStatsSink {
    /// Creates a sink with empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Arc::new(Mutex::new(Stages {
                cpu: LiveStats::new("cpu"),
                submit: LiveStats::new("submit"),
                gpu: LiveStats::new("gpu"),
                lag: LiveStats::new("lag"),
                begun: HashMap::new(),
                submitting: HashMap::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Stages) -> R) -> R {
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stages)
    }

    /// Reduces every stage, in table order, and clears them.
    pub fn get_and_reset(&self) -> Vec<(String, Summary)> {
        self.with(|stages| {
            stages
                .all_mut()
                .into_iter()
                .map(|s| (s.name().to_owned(), s.get_and_reset()))
                .collect()
        })
    }

    /// Writes the header and one row per stage, then clears them.
    pub fn print_and_reset(&self, out: &mut impl Write) -> fmt::Result {
        self.with(|stages| {
            writeln!(out, "{HEADER}")?;
            for stats in stages.all_mut() {
                stats.print_and_reset(out)?;
                writeln!(out)?;
            }
            Ok(())
        })
    }

    /// Logs the table at INFO, one event per row, then clears it.
    pub fn log_and_reset(&self) {
        let mut table = String::new();
        if self.print_and_reset(&mut table).is_err() {
            return;
        }
        for line in table.lines() {
            tracing::info!("{line}");
        }
    }
}

impl TraceSink for LiveStatsSink {
    fn on_timing_point(&mut self, e: &TimingPointEvent) {
        self.with(|stages| match e.point {
            TimingPoint::WakeUp => {}
            TimingPoint::Begin => {
                stages.begun.insert(e.frame_id, e.when);
            }
            TimingPoint::SubmitBegin => {
                if let Some(begin) = stages.begun.remove(&e.frame_id) {
                    stages.cpu.add(e.when.saturating_duration_since(begin));
                }
                stages.submitting.insert(e.frame_id, e.when);
            }
            TimingPoint::SubmitEnd => {
                if let Some(start) = stages.submitting.remove(&e.frame_id) {
                    stages.submit.add(e.when.saturating_duration_since(start));
                }
                // Frames that never reach submit leave nothing behind.
                stages.begun.retain(|id, _| *id > e.frame_id);
            }
        });
    }

    fn on_gpu_timing(&mut self, e: &GpuTimingEvent) {
        self.with(|stages| stages.gpu.add(e.duration()));
    }

    fn on_frame_lag(&mut self, e: &FrameLagEvent) {
        self.with(|stages| stages.lag.add(e.lag()));
    }
}
