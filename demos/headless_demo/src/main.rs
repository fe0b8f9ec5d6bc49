// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU-less frame loop driving the full renderer pipeline.
//!
//! A static side-by-side HMD renders into a
//! [`HeadlessTarget`](parallax_render::targets::headless::HeadlessTarget)
//! through the null GPU device. Frame statistics are logged every
//! [`STATS_INTERVAL`] frames, and when a path is given on the command line
//! the whole run is exported as a Chrome trace:
//!
//! ```text
//! RUST_LOG=debug cargo run -p headless_demo -- trace.json
//! ```

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ash::vk;
use kurbo::Point;
use parallax_core::device::{Device, DeviceError, HmdParts, InputName, UvTriplet};
use parallax_core::frame::Frame;
use parallax_core::geometry::{Fov, Pose, Quat, RelationFlags, SpaceRelation, Vec3};
use parallax_core::time::Timestamp;
use parallax_core::trace::{
    FrameLagEvent, FrameSkippedEvent, GpuTimingEvent, TimingPointEvent, TraceSink,
};
use parallax_debug::live_stats::LiveStatsSink;
use parallax_debug::recorder::RecorderSink;
use parallax_render::gpu::SharedQueue;
use parallax_render::layer::{CompositorLayer, LayerFrame};
use parallax_render::null::{NullDevice, NullQueue};
use parallax_render::targets::headless::HeadlessTarget;
use parallax_render::{Renderer, RendererSettings, clock};
use tracing_subscriber::EnvFilter;

const FRAME_COUNT: u32 = 300;
const STATS_INTERVAL: u32 = 75;
/// 75 Hz panel.
const FRAME_INTERVAL: Duration = Duration::from_nanos(13_333_333);
/// Head yaw speed in radians per second.
const YAW_RATE: f32 = 0.5;

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A fixed 1920x1080 side-by-side HMD whose head slowly turns.
struct DemoHmd {
    parts: HmdParts,
}

impl DemoHmd {
    fn new() -> Self {
        Self {
            parts: HmdParts::side_by_side(
                1920,
                1080,
                FRAME_INTERVAL,
                vec![Fov::symmetric(1.6, 1.7); 2],
            ),
        }
    }
}

impl Device for DemoHmd {
    fn name(&self) -> &str {
        "demo hmd"
    }

    fn hmd(&self) -> &HmdParts {
        &self.parts
    }

    fn get_tracked_pose(
        &self,
        input: InputName,
        at: Timestamp,
    ) -> Result<SpaceRelation, DeviceError> {
        if input != InputName::HeadPose {
            return Err(DeviceError::InputUnsupported(input));
        }
        let seconds = Duration::from_nanos(at.nanos()).as_secs_f32();
        Ok(SpaceRelation {
            pose: Pose {
                orientation: Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), seconds * YAW_RATE),
                position: Vec3::new(0.0, 1.6, 0.0),
            },
            flags: RelationFlags::ORIENTATION_VALID.union(RelationFlags::POSITION_VALID),
        })
    }

    fn compute_distortion(&self, view: usize, u: f32, v: f32) -> Result<UvTriplet, DeviceError> {
        let count = self.parts.view_count();
        if view >= count {
            return Err(DeviceError::ViewOutOfRange { index: view, count });
        }
        Ok(UvTriplet::uniform(Point::new(f64::from(u), f64::from(v))))
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Feeds every event to the live statistics and the recorder.
struct DemoSinks {
    stats: LiveStatsSink,
    recorder: Arc<Mutex<RecorderSink>>,
}

impl DemoSinks {
    fn with_recorder(&self, f: impl FnOnce(&mut RecorderSink)) {
        f(&mut self.recorder.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl TraceSink for DemoSinks {
    fn on_timing_point(&mut self, e: &TimingPointEvent) {
        self.stats.on_timing_point(e);
        self.with_recorder(|r| r.on_timing_point(e));
    }

    fn on_gpu_timing(&mut self, e: &GpuTimingEvent) {
        self.stats.on_gpu_timing(e);
        self.with_recorder(|r| r.on_gpu_timing(e));
    }

    fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
        self.stats.on_frame_skipped(e);
        self.with_recorder(|r| r.on_frame_skipped(e));
    }

    fn on_frame_lag(&mut self, e: &FrameLagEvent) {
        self.stats.on_frame_lag(e);
        self.with_recorder(|r| r.on_frame_lag(e));
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn sleep_until(when: Timestamp) {
    let wait = when.saturating_duration_since(clock::now());
    if !wait.is_zero() {
        std::thread::sleep(wait);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let trace_path = std::env::args().nth(1);

    let gpu = Arc::new(NullDevice::new());
    gpu.set_timestamps(true);
    let (queue, log) = NullQueue::new();
    let target = HeadlessTarget::new(
        gpu.clone(),
        HeadlessTarget::DEFAULT_IMAGE_COUNT,
        FRAME_INTERVAL,
    );

    let mut renderer = Renderer::new(
        RendererSettings::graphics(),
        Box::new(DemoHmd::new()),
        gpu,
        SharedQueue::new(queue),
        Box::new(target),
    )?;

    let stats = LiveStatsSink::new();
    let recorder = Arc::new(Mutex::new(RecorderSink::new()));
    renderer.set_trace_sink(Box::new(DemoSinks {
        stats: stats.clone(),
        recorder: recorder.clone(),
    }));

    let mut layers = LayerFrame::new();
    layers.push(CompositorLayer::projection(vec![vk::ImageView::null(); 2]));

    tracing::info!(frames = FRAME_COUNT, "Starting headless frame loop");
    for frame_number in 1..=FRAME_COUNT {
        let pacing = renderer.predict_frame();
        sleep_until(pacing.wake_up);
        renderer.mark_wake_up(pacing.frame_id);
        renderer.queue_frame(Frame::from(&pacing))?;
        renderer.draw(&layers)?;

        if frame_number % STATS_INTERVAL == 0 {
            stats.log_and_reset();
        }
    }
    tracing::info!(submissions = log.len(), "Frame loop done");

    if let Some(path) = trace_path {
        let recorder = recorder.lock().unwrap_or_else(PoisonError::into_inner);
        let mut writer = BufWriter::new(File::create(&path)?);
        parallax_debug::chrome::export(recorder.as_bytes(), &mut writer)?;
        tracing::info!(%path, "Wrote Chrome trace");
    }
    Ok(())
}
