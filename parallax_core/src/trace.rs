// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the compositor frame loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! renderer calls as a frame moves through its pipeline. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! Sinks are purely observational: nothing they do affects the frame being
//! drawn.

use core::time::Duration;

use crate::frame::FrameId;
use crate::pacing::TimingPoint;
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted for every timing point the renderer marks on its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingPointEvent {
    /// Frame the point belongs to.
    pub frame_id: FrameId,
    /// Which point.
    pub point: TimingPoint,
    /// When it happened.
    pub when: Timestamp,
}

/// Emitted when GPU timestamps for a frame were read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuTimingEvent {
    /// Frame the work belongs to.
    pub frame_id: FrameId,
    /// GPU start of the frame's work.
    pub gpu_start: Timestamp,
    /// GPU end of the frame's work.
    pub gpu_end: Timestamp,
    /// When the timestamps were read.
    pub when: Timestamp,
}

impl GpuTimingEvent {
    /// GPU execution time.
    #[inline]
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.gpu_end.saturating_duration_since(self.gpu_start)
    }
}

/// Why a frame did no GPU work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The target could not produce images.
    TargetNotReady,
    /// No target image could be acquired.
    NoImage,
    /// Recording or submitting GPU work failed.
    DispatchFailed,
}

/// Emitted when a frame is cleared without submitting GPU work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSkippedEvent {
    /// Skipped frame.
    pub frame_id: FrameId,
    /// Why.
    pub reason: SkipReason,
}

/// Emitted when presentation completed noticeably late.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLagEvent {
    /// The late frame.
    pub frame_id: FrameId,
    /// When it should have been presented.
    pub desired_present: Timestamp,
    /// When the wait for presentation returned.
    pub completed: Timestamp,
}

impl FrameLagEvent {
    /// How late the frame was.
    #[inline]
    #[must_use]
    pub fn lag(&self) -> Duration {
        self.completed.saturating_duration_since(self.desired_present)
    }
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives frame-loop events.
///
/// Every method has a default no-op body.
pub trait TraceSink {
    /// Called for every timing point.
    fn on_timing_point(&mut self, e: &TimingPointEvent) {
        _ = e;
    }

    /// Called when GPU timestamps are available.
    fn on_gpu_timing(&mut self, e: &GpuTimingEvent) {
        _ = e;
    }

    /// Called when a frame is cleared without GPU work.
    fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
        _ = e;
    }

    /// Called when presentation was late.
    fn on_frame_lag(&mut self, e: &FrameLagEvent) {
        _ = e;
    }
}

/// A sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_timing_point(&TimingPointEvent {
            frame_id: FrameId(1),
            point: TimingPoint::Begin,
            when: Timestamp(0),
        });
        sink.on_frame_skipped(&FrameSkippedEvent {
            frame_id: FrameId(1),
            reason: SkipReason::TargetNotReady,
        });
    }

    #[test]
    fn recording_sink_sees_points() {
        struct RecordingSink {
            points: Vec<TimingPoint>,
        }
        impl TraceSink for RecordingSink {
            fn on_timing_point(&mut self, e: &TimingPointEvent) {
                self.points.push(e.point);
            }
        }

        let mut sink = RecordingSink { points: Vec::new() };
        for point in [TimingPoint::Begin, TimingPoint::SubmitBegin] {
            sink.on_timing_point(&TimingPointEvent {
                frame_id: FrameId(3),
                point,
                when: Timestamp(10),
            });
        }
        assert_eq!(sink.points, &[TimingPoint::Begin, TimingPoint::SubmitBegin]);
    }

    #[test]
    fn lag_and_gpu_durations() {
        let lag = FrameLagEvent {
            frame_id: FrameId(1),
            desired_present: Timestamp(1_000_000),
            completed: Timestamp(3_500_000),
        };
        assert_eq!(lag.lag(), Duration::from_micros(2_500));

        let gpu = GpuTimingEvent {
            frame_id: FrameId(1),
            gpu_start: Timestamp(100),
            gpu_end: Timestamp(50),
            when: Timestamp(200),
        };
        assert_eq!(gpu.duration(), Duration::ZERO, "inverted window clamps to zero");
    }
}
