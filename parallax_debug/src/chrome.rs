// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! CPU-side events land on thread 0 and GPU work on thread 1, so the two
//! timelines stack in the viewer.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use parallax_core::time::Timestamp;
use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

const CPU_TID: u32 = 0;
const GPU_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Skips carry no timestamp; they are placed at the last known time.
    let mut last_ts = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::TimingPoint(e) => {
                last_ts = to_us(e.when);
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.point),
                    "cat": "Frame",
                    "ts": to_us(e.when),
                    "pid": 0,
                    "tid": CPU_TID,
                    "s": "t",
                    "args": {
                        "frame_id": e.frame_id.0,
                    }
                }));
            }
            RecordedEvent::GpuTiming(e) => {
                events.push(json!({
                    "ph": "X",
                    "name": "Gpu",
                    "cat": "Gpu",
                    "ts": to_us(e.gpu_start),
                    "dur": e.duration().as_nanos() as f64 / 1000.0,
                    "pid": 0,
                    "tid": GPU_TID,
                    "args": {
                        "frame_id": e.frame_id.0,
                    }
                }));
            }
            RecordedEvent::FrameSkipped(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSkipped",
                    "cat": "Frame",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": CPU_TID,
                    "s": "p",
                    "args": {
                        "frame_id": e.frame_id.0,
                        "reason": format!("{:?}", e.reason),
                    }
                }));
            }
            RecordedEvent::FrameLag(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameLag",
                    "cat": "Present",
                    "ts": to_us(e.completed),
                    "pid": 0,
                    "tid": CPU_TID,
                    "s": "g",
                    "args": {
                        "frame_id": e.frame_id.0,
                        "lag_ms": e.lag().as_secs_f64() * 1000.0,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_us(t: Timestamp) -> f64 {
    t.nanos() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use parallax_core::frame::FrameId;
    use parallax_core::pacing::TimingPoint;
    use parallax_core::trace::{
        FrameLagEvent, FrameSkippedEvent, GpuTimingEvent, SkipReason, TimingPointEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_timing_point(&TimingPointEvent {
            frame_id: FrameId(3),
            point: TimingPoint::SubmitBegin,
            when: Timestamp(2_000_000),
        });
        rec.on_gpu_timing(&GpuTimingEvent {
            frame_id: FrameId(3),
            gpu_start: Timestamp(2_100_000),
            gpu_end: Timestamp(2_600_000),
            when: Timestamp(3_000_000),
        });
        rec.on_frame_lag(&FrameLagEvent {
            frame_id: FrameId(3),
            desired_present: Timestamp(10_000_000),
            completed: Timestamp(12_000_000),
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "SubmitBegin");
        assert_eq!(parsed[0]["ts"], 2000.0);

        assert_eq!(parsed[1]["ph"], "X");
        assert_eq!(parsed[1]["tid"], GPU_TID);
        assert_eq!(parsed[1]["dur"], 500.0);

        assert_eq!(parsed[2]["name"], "FrameLag");
        let lag_ms = parsed[2]["args"]["lag_ms"].as_f64().unwrap();
        assert!((lag_ms - 2.0).abs() < 1e-9, "lag_ms {lag_ms}");
    }

    #[test]
    fn skipped_frame_carries_reason() {
        let mut rec = RecorderSink::new();
        rec.on_timing_point(&TimingPointEvent {
            frame_id: FrameId(9),
            point: TimingPoint::WakeUp,
            when: Timestamp(5_000),
        });
        rec.on_frame_skipped(&FrameSkippedEvent {
            frame_id: FrameId(9),
            reason: SkipReason::TargetNotReady,
        });
        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[1]["args"]["reason"], "TargetNotReady");
        assert_eq!(parsed[1]["args"]["frame_id"], 9);
        assert_eq!(parsed[1]["ts"], 5.0, "placed at the last timing point");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty());
    }
}
