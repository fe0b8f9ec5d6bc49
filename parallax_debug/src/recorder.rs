// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use parallax_core::frame::FrameId;
use parallax_core::pacing::TimingPoint;
use parallax_core::time::Timestamp;
use parallax_core::trace::{
    FrameLagEvent, FrameSkippedEvent, GpuTimingEvent, SkipReason, TimingPointEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TIMING_POINT: u8 = 1;
const TAG_GPU_TIMING: u8 = 2;
const TAG_FRAME_SKIPPED: u8 = 3;
const TAG_FRAME_LAG: u8 = 4;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_frame_id(&mut self, id: FrameId) {
        self.buf.extend_from_slice(&id.0.to_le_bytes());
    }

    fn write_timestamp(&mut self, t: Timestamp) {
        self.write_u64(t.nanos());
    }

    fn write_point(&mut self, p: TimingPoint) {
        self.write_u8(match p {
            TimingPoint::WakeUp => 0,
            TimingPoint::Begin => 1,
            TimingPoint::SubmitBegin => 2,
            TimingPoint::SubmitEnd => 3,
        });
    }

    fn write_reason(&mut self, r: SkipReason) {
        self.write_u8(match r {
            SkipReason::TargetNotReady => 0,
            SkipReason::NoImage => 1,
            SkipReason::DispatchFailed => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_timing_point(&mut self, e: &TimingPointEvent) {
        self.write_u8(TAG_TIMING_POINT);
        self.write_frame_id(e.frame_id);
        self.write_point(e.point);
        self.write_timestamp(e.when);
    }

    fn on_gpu_timing(&mut self, e: &GpuTimingEvent) {
        self.write_u8(TAG_GPU_TIMING);
        self.write_frame_id(e.frame_id);
        self.write_timestamp(e.gpu_start);
        self.write_timestamp(e.gpu_end);
        self.write_timestamp(e.when);
    }

    fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
        self.write_u8(TAG_FRAME_SKIPPED);
        self.write_frame_id(e.frame_id);
        self.write_reason(e.reason);
    }

    fn on_frame_lag(&mut self, e: &FrameLagEvent) {
        self.write_u8(TAG_FRAME_LAG);
        self.write_frame_id(e.frame_id);
        self.write_timestamp(e.desired_present);
        self.write_timestamp(e.completed);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`TimingPointEvent`].
    TimingPoint(TimingPointEvent),
    /// A [`GpuTimingEvent`].
    GpuTiming(GpuTimingEvent),
    /// A [`FrameSkippedEvent`].
    FrameSkipped(FrameSkippedEvent),
    /// A [`FrameLagEvent`].
    FrameLag(FrameLagEvent),
}

impl RecordedEvent {
    /// Frame the event belongs to.
    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        match self {
            Self::TimingPoint(e) => e.frame_id,
            Self::GpuTiming(e) => e.frame_id,
            Self::FrameSkipped(e) => e.frame_id,
            Self::FrameLag(e) => e.frame_id,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_frame_id(&mut self) -> Option<FrameId> {
        self.take().map(|b| FrameId(i64::from_le_bytes(b)))
    }

    fn read_timestamp(&mut self) -> Option<Timestamp> {
        self.take().map(|b| Timestamp(u64::from_le_bytes(b)))
    }

    fn read_point(&mut self) -> Option<TimingPoint> {
        Some(match self.read_u8()? {
            0 => TimingPoint::WakeUp,
            1 => TimingPoint::Begin,
            2 => TimingPoint::SubmitBegin,
            _ => TimingPoint::SubmitEnd,
        })
    }

    fn read_reason(&mut self) -> Option<SkipReason> {
        Some(match self.read_u8()? {
            0 => SkipReason::TargetNotReady,
            1 => SkipReason::NoImage,
            _ => SkipReason::DispatchFailed,
        })
    }

    fn decode_timing_point(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TimingPoint(TimingPointEvent {
            frame_id: self.read_frame_id()?,
            point: self.read_point()?,
            when: self.read_timestamp()?,
        }))
    }

    fn decode_gpu_timing(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::GpuTiming(GpuTimingEvent {
            frame_id: self.read_frame_id()?,
            gpu_start: self.read_timestamp()?,
            gpu_end: self.read_timestamp()?,
            when: self.read_timestamp()?,
        }))
    }

    fn decode_frame_skipped(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSkipped(FrameSkippedEvent {
            frame_id: self.read_frame_id()?,
            reason: self.read_reason()?,
        }))
    }

    fn decode_frame_lag(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameLag(FrameLagEvent {
            frame_id: self.read_frame_id()?,
            desired_present: self.read_timestamp()?,
            completed: self.read_timestamp()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_TIMING_POINT => self.decode_timing_point(),
            TAG_GPU_TIMING => self.decode_gpu_timing(),
            TAG_FRAME_SKIPPED => self.decode_frame_skipped(),
            TAG_FRAME_LAG => self.decode_frame_lag(),
            _ => None, // unknown tag ends the recording
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
