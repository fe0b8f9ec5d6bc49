// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in microseconds.

use std::io::Write;

use parallax_core::pacing::TimingPoint;
use parallax_core::time::Timestamp;
use parallax_core::trace::{
    FrameLagEvent, FrameSkippedEvent, GpuTimingEvent, SkipReason, TimingPointEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(t: Timestamp) -> f64 {
    t.nanos() as f64 / 1000.0
}

fn point_name(point: TimingPoint) -> &'static str {
    match point {
        TimingPoint::WakeUp => "wake",
        TimingPoint::Begin => "begin",
        TimingPoint::SubmitBegin => "submit:begin",
        TimingPoint::SubmitEnd => "submit:end",
    }
}

fn reason_name(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::TargetNotReady => "target-not-ready",
        SkipReason::NoImage => "no-image",
        SkipReason::DispatchFailed => "dispatch-failed",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_timing_point(&mut self, e: &TimingPointEvent) {
        _ = writeln!(
            self.writer,
            "[{}] frame={} at {:.1}µs",
            point_name(e.point),
            e.frame_id.0,
            us(e.when),
        );
    }

    fn on_gpu_timing(&mut self, e: &GpuTimingEvent) {
        _ = writeln!(
            self.writer,
            "[gpu] frame={} start={:.1}µs took={:.1}µs",
            e.frame_id.0,
            us(e.gpu_start),
            e.duration().as_nanos() as f64 / 1000.0,
        );
    }

    fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
        _ = writeln!(
            self.writer,
            "[skip] frame={} reason={}",
            e.frame_id.0,
            reason_name(e.reason),
        );
    }

    fn on_frame_lag(&mut self, e: &FrameLagEvent) {
        _ = writeln!(
            self.writer,
            "[lag] frame={} late by {:.3}ms",
            e.frame_id.0,
            e.lag().as_secs_f64() * 1000.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::frame::FrameId;

    fn output(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn pretty_print_timing_point() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_timing_point(&TimingPointEvent {
            frame_id: FrameId(1),
            point: TimingPoint::SubmitBegin,
            when: Timestamp(1_000_000),
        });
        let out = output(sink);
        assert_eq!(out, "[submit:begin] frame=1 at 1000.0µs\n", "got: {out}");
    }

    #[test]
    fn pretty_print_skip_and_lag() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_frame_skipped(&FrameSkippedEvent {
            frame_id: FrameId(2),
            reason: SkipReason::NoImage,
        });
        sink.on_frame_lag(&FrameLagEvent {
            frame_id: FrameId(2),
            desired_present: Timestamp(10_000_000),
            completed: Timestamp(11_500_000),
        });
        let out = output(sink);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2, "got: {out}");
        assert!(lines[0].contains("reason=no-image"), "got: {out}");
        assert!(lines[1].contains("late by 1.500ms"), "got: {out}");
    }

    #[test]
    fn pretty_print_gpu() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_gpu_timing(&GpuTimingEvent {
            frame_id: FrameId(5),
            gpu_start: Timestamp(2_000),
            gpu_end: Timestamp(4_500),
            when: Timestamp(5_000),
        });
        let out = output(sink);
        assert!(out.contains("took=2.5µs"), "got: {out}");
    }
}
