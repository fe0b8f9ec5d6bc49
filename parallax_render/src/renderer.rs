// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame loop: acquire, dispatch, submit, present and pace.
//!
//! A [`Renderer`] owns one [`Target`], the per-image [`RenderSlots`] built
//! over its images and the per-view [`Scratch`] pool. Each call to
//! [`Renderer::draw`] takes the waited frame through this pipeline:
//!
//! ```text
//!   begin_rendering ─► mark Begin ─► target ready? ──no──► mark SubmitBegin/End,
//!                                        │                 clear frame, skip
//!                                       yes
//!                                        ▼
//!   acquire (recreate on stale) ─► scratch begin ─► view data ─► record
//!                                                                   │
//!   ┌───────────────────────────────────────────────────────────────┘
//!   ▼
//!   wait last fence ─► reset fence ─► mark SubmitBegin ─► submit ─► mark SubmitEnd
//!        │
//!        ▼
//!   peek ─► present (resize on stale) ─► clear frame ─► mirror ─► queue idle
//!        │
//!        ▼
//!   scratch end ─► GPU timings ─► wait for present (lag check) ─► update timings
//! ```
//!
//! Every frame that reaches `draw` gets its `SubmitBegin` and `SubmitEnd`
//! points marked, whether or not GPU work was submitted, so the pacing
//! model never sees a frame vanish.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use parallax_core::device::Device;
use parallax_core::frame::{Frame, FrameId, FrameSlots};
use parallax_core::pacing::{FramePacing, TimingPoint};
use parallax_core::time::{MILLISECOND, Timestamp, scale_duration};
use parallax_core::trace::{
    FrameLagEvent, FrameSkippedEvent, GpuTimingEvent, SkipReason, TimingPointEvent, TraceSink,
};
use tracing::Level;

use crate::clock;
use crate::config::RendererSettings;
use crate::error::{PeekError, RenderError, TargetError};
use crate::gpu::{ComputeDispatch, GraphicsDispatch, RenderDevice, SharedQueue, Submission};
use crate::layer::LayerFrame;
use crate::mirror::{MirrorFrame, MirrorSink};
use crate::peek::{Peek, PeekSource};
use crate::resources::{RenderSlots, SlotBinding};
use crate::scratch::{Scratch, ScratchAccess, ScratchFrame};
use crate::target::{CreateImagesInfo, Target};
use crate::view::calc_view_data;

/// Present waits time out after this many nominal frame intervals.
const PRESENT_WAIT_FACTOR: f64 = 2.5;

/// Drives one target.
pub struct Renderer {
    settings: RendererSettings,
    device: Box<dyn Device>,
    gpu: Arc<dyn RenderDevice>,
    queue: SharedQueue,
    target: Box<dyn Target>,
    slots: RenderSlots,
    scratch: Scratch,
    frames: FrameSlots,
    mirror: Option<Box<dyn MirrorSink>>,
    peek: Option<Peek>,
    trace: Option<Box<dyn TraceSink>>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("device", &self.device.name())
            .field("target", &self.target.name())
            .field("slots", &self.slots)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Creates a renderer for `device` presenting into `target`.
    ///
    /// Scratch images are allocated right away and failure to do so is an
    /// error. Target images are attempted too, but a target that is not
    /// ready yet is fine; they will be created on first use.
    pub fn new(
        settings: RendererSettings,
        device: Box<dyn Device>,
        gpu: Arc<dyn RenderDevice>,
        queue: SharedQueue,
        target: Box<dyn Target>,
    ) -> Result<Self, RenderError> {
        let mut scratch = Scratch::new();
        scratch.ensure(
            gpu.as_ref(),
            device.hmd().view_count(),
            settings.scratch_extent,
            settings.scratch_format,
        )?;

        let mut renderer = Self {
            settings,
            device,
            gpu,
            queue,
            target,
            slots: RenderSlots::new(),
            scratch,
            frames: FrameSlots::new(),
            mirror: None,
            peek: None,
            trace: None,
        };

        if let Err(err) = renderer.ensure_images_and_renderings(false) {
            tracing::debug!("Target images not created yet: {err}");
        }
        Ok(renderer)
    }

    /// Installs a trace sink.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Installs a mirror sink.
    pub fn set_mirror(&mut self, mirror: Box<dyn MirrorSink>) {
        self.mirror = Some(mirror);
    }

    /// Attaches a peek window. Target images are recreated so they can be
    /// blitted from.
    pub fn attach_peek(&mut self, peek: Peek) -> Result<(), PeekError> {
        if self.settings.use_compute {
            return Err(PeekError::ComputeUnsupported);
        }
        self.peek = Some(peek);
        if self.target.check_ready() {
            if let Err(err) = self.ensure_images_and_renderings(true) {
                tracing::warn!("Failed to recreate target images for peek: {err}");
            }
        }
        Ok(())
    }

    /// Settings in use.
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// The target.
    #[must_use]
    pub fn target(&self) -> &dyn Target {
        self.target.as_ref()
    }

    /// Per-image resources.
    #[must_use]
    pub fn slots(&self) -> &RenderSlots {
        &self.slots
    }

    /// Scratch pool.
    #[must_use]
    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    /// Frame slots.
    #[must_use]
    pub fn frames(&self) -> &FrameSlots {
        &self.frames
    }

    // -----------------------------------------------------------------------
    // Frame entry points
    // -----------------------------------------------------------------------

    /// Asks the target's pacer for the next frame.
    pub fn predict_frame(&mut self) -> FramePacing {
        self.target.calc_frame_pacing(clock::now())
    }

    /// Marks that the compositor woke up for `frame_id`.
    pub fn mark_wake_up(&mut self, frame_id: FrameId) {
        self.mark(TimingPoint::WakeUp, frame_id);
    }

    /// Queues `frame` as the next one to draw.
    pub fn queue_frame(&mut self, frame: Frame) -> Result<(), RenderError> {
        Ok(self.frames.set_waited(frame)?)
    }

    /// Draws the waited frame.
    ///
    /// A target that is not ready, or an image that cannot be acquired, is
    /// not an error: the frame is cleared without GPU work and `Ok` is
    /// returned. Recording or submission failures return the error after
    /// the frame and its scratch slots have been released.
    pub fn draw(&mut self, layers: &LayerFrame) -> Result<(), RenderError> {
        let frame = self.frames.begin_rendering()?;
        self.mark(TimingPoint::Begin, frame.id);

        if !self.target.check_ready() {
            self.skip_frame(frame.id, SkipReason::TargetNotReady);
            return Ok(());
        }

        self.target.flush();
        self.update_timings();

        if self.slots.acquired().is_none() {
            self.acquire_image();
        }
        let Some(slot) = self.slots.acquired() else {
            self.skip_frame(frame.id, SkipReason::NoImage);
            return Ok(());
        };

        let mut scratch_frame = self.scratch.begin_frame();
        let result = self.render_and_present(&frame, slot, layers, &mut scratch_frame);
        if result.is_err() {
            scratch_frame.abandon();
        }
        self.scratch.end_frame(&mut scratch_frame);
        let mirrored = result?;

        if mirrored {
            self.report_gpu_timings(frame.id);
        }

        self.wait_for_present(frame.id, frame.desired_present);
        self.update_timings();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pipeline steps
    // -----------------------------------------------------------------------

    /// Dispatch through mirror. Returns whether the mirror step succeeded
    /// (or had nothing to do).
    fn render_and_present(
        &mut self,
        frame: &Frame,
        slot: u32,
        layers: &LayerFrame,
        scratch_frame: &mut ScratchFrame,
    ) -> Result<bool, RenderError> {
        let command_buffer = match self.record(frame, slot, layers, scratch_frame) {
            Ok(cb) => cb,
            Err(err) => {
                tracing::error!("Failed to record frame {}: {err}", frame.id);
                self.skip_frame(frame.id, SkipReason::DispatchFailed);
                return Err(err);
            }
        };

        if let Err(err) = self.submit(command_buffer, frame.id, slot) {
            tracing::error!("Failed to submit frame {}: {err}", frame.id);
            self.frames.clear_rendering();
            self.emit_skipped(frame.id, SkipReason::DispatchFailed);
            return Err(err);
        }

        self.blit_peek(slot, scratch_frame);
        self.present(frame);
        self.frames.clear_rendering();

        let mirrored = self.mirror(frame, scratch_frame);

        // Everything referenced by the command buffer may be touched after
        // this point.
        self.wait_queue_idle();
        Ok(mirrored)
    }

    fn record(
        &self,
        frame: &Frame,
        slot: u32,
        layers: &LayerFrame,
        scratch_frame: &mut ScratchFrame,
    ) -> Result<vk::CommandBuffer, RenderError> {
        let render_slot = *self.slots.slot(slot).ok_or(RenderError::NotAcquired)?;
        let images = self.target.images();
        let extent = images.extent();
        let views = calc_view_data(
            self.device.as_ref(),
            extent,
            images.pre_rotate(),
            self.settings.fov_source,
            frame.predicted_display,
            !self.settings.use_compute,
        );
        let scratch = ScratchAccess::new(&self.scratch, scratch_frame);

        let command_buffer = match render_slot.binding {
            SlotBinding::Graphics { framebuffer } => {
                self.gpu.record_graphics(&mut GraphicsDispatch {
                    frame_id: frame.id,
                    layers,
                    views: &views,
                    slot,
                    render_pass: self.slots.render_pass().unwrap_or_default(),
                    framebuffer,
                    extent,
                    scratch,
                })?
            }
            SlotBinding::Compute {
                image,
                storage_view,
            } => self.gpu.record_compute(&mut ComputeDispatch {
                frame_id: frame.id,
                layers,
                views: &views,
                slot,
                image,
                storage_view,
                extent,
                scratch,
            })?,
        };
        Ok(command_buffer)
    }

    fn submit(
        &mut self,
        command_buffer: vk::CommandBuffer,
        frame_id: FrameId,
        slot: u32,
    ) -> Result<(), RenderError> {
        if let Err(err) = self.slots.wait_for_last_fence(self.gpu.as_ref()) {
            tracing::warn!("Failed waiting for the previous frame's fence: {err}");
        }

        let fence = self.slots.slot(slot).ok_or(RenderError::NotAcquired)?.fence;
        self.gpu.reset_fence(fence)?;

        let semaphores = self.target.semaphores();
        let stage = if self.settings.use_compute {
            vk::PipelineStageFlags::COMPUTE_SHADER
        } else {
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        };
        let submission = Submission {
            command_buffer,
            wait: semaphores.present_complete.map(|s| (s, stage)),
            signal: semaphores.render_complete,
            timeline_value: semaphores
                .render_complete_is_timeline
                .then(|| frame_id.timeline_value()),
            fence,
        };

        self.mark(TimingPoint::SubmitBegin, frame_id);
        let result = self.queue.submit(&submission);
        self.mark(TimingPoint::SubmitEnd, frame_id);
        result?;

        self.slots.set_fenced(slot);
        Ok(())
    }

    fn blit_peek(&mut self, slot: u32, scratch_frame: &ScratchFrame) {
        let Some(peek) = self.peek.as_mut() else {
            return;
        };
        let source = match peek.eye().view() {
            Some(view) => {
                let image = scratch_frame
                    .views()
                    .get(view)
                    .and_then(|state| self.scratch.image(view, state.index));
                image.map(|image| PeekSource {
                    image: image.image,
                    layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    extent: self.scratch.extent(),
                })
            }
            None => self.target.images().get(slot).ok().map(|image| PeekSource {
                image: image.image,
                layout: vk::ImageLayout::PRESENT_SRC_KHR,
                extent: self.target.images().extent(),
            }),
        };
        let Some(source) = source else {
            return;
        };
        if let Err(err) = peek.blit(&self.queue, source) {
            tracing::warn!("Peek blit failed: {err}");
        }
    }

    fn present(&mut self, frame: &Frame) {
        let Some(index) = self.slots.take_acquired() else {
            return;
        };
        let result = self.target.present(
            &self.queue,
            index,
            frame.id.timeline_value(),
            frame.desired_present,
            frame.present_slop,
        );
        match result {
            Ok(()) => {}
            Err(err) if err.is_stale() => {
                tracing::debug!("Target stale on present ({err}), resizing");
                self.resize();
            }
            Err(err) => tracing::error!("Failed to present frame {}: {err}", frame.id),
        }
    }

    fn mirror(&mut self, frame: &Frame, scratch_frame: &ScratchFrame) -> bool {
        let Some(mirror) = self.mirror.as_mut() else {
            return true;
        };
        if !mirror.is_ready_and_active(frame.predicted_display) {
            return true;
        }
        let image = scratch_frame
            .views()
            .first()
            .and_then(|state| self.scratch.image(0, state.index));
        let Some(image) = image else {
            return true;
        };
        let extent = self.scratch.extent();
        let mirror_frame = MirrorFrame {
            frame_id: frame.id,
            predicted_display: frame.predicted_display,
            image: *image,
            extent,
            rect: MirrorFrame::FULL_VIEW,
        };
        match mirror.blit(&mirror_frame) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Mirror blit failed: {err}");
                false
            }
        }
    }

    fn report_gpu_timings(&mut self, frame_id: FrameId) {
        let Some((gpu_start, gpu_end)) = self.gpu.gpu_timestamps() else {
            return;
        };
        let when = clock::now();
        self.target.info_gpu(frame_id, gpu_start, gpu_end, when);
        if let Some(trace) = self.trace.as_mut() {
            trace.on_gpu_timing(&GpuTimingEvent {
                frame_id,
                gpu_start,
                gpu_end,
                when,
            });
        }
    }

    fn wait_for_present(&mut self, frame_id: FrameId, desired_present: Timestamp) {
        if !self.target.check_ready() {
            return;
        }

        let before = clock::now();
        let timeout = scale_duration(self.settings.nominal_frame_interval, PRESENT_WAIT_FACTOR);
        match self.target.wait_for_present(timeout) {
            Ok(()) => {}
            Err(TargetError::Unsupported) => {
                // Without present waits, block in acquire instead.
                if self.slots.acquired().is_none() {
                    self.acquire_image();
                }
            }
            Err(TargetError::Timeout) => tracing::debug!("Timed out waiting for present"),
            Err(err) => tracing::warn!("Waiting for present failed: {err}"),
        }
        let after = clock::now();

        if before + MILLISECOND < after && desired_present + MILLISECOND < after {
            let event = FrameLagEvent {
                frame_id,
                desired_present,
                completed: after,
            };
            log_frame_lag(self.settings.frame_lag_level, frame_id, event.lag());
            if let Some(trace) = self.trace.as_mut() {
                trace.on_frame_lag(&event);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Target images and per-image resources
    // -----------------------------------------------------------------------

    fn acquire_image(&mut self) {
        debug_assert!(
            self.slots.acquired().is_none(),
            "an image is already acquired"
        );

        if let Err(err) = self.ensure_images_and_renderings(false) {
            tracing::debug!("Not acquiring: {err}");
            return;
        }

        let index = match self.target.acquire() {
            Ok(index) => index,
            Err(err) if err.is_stale() => {
                tracing::debug!("Target stale on acquire ({err}), recreating");
                if let Err(err) = self.ensure_images_and_renderings(true) {
                    tracing::error!("Failed to recreate target images: {err}");
                    return;
                }
                match self.target.acquire() {
                    Ok(index) => index,
                    Err(err) => {
                        tracing::error!("Failed to acquire after recreation: {err}");
                        return;
                    }
                }
            }
            Err(err) => {
                tracing::error!("Failed to acquire target image: {err}");
                return;
            }
        };

        if let Err(err) = self.slots.set_acquired(index) {
            tracing::error!("Target returned image {index} without resources: {err}");
        }
    }

    /// Makes sure target images and per-image resources exist.
    ///
    /// Recreates them when `force_recreate` is set, when the target lost
    /// its images or when no resources exist; otherwise does nothing.
    fn ensure_images_and_renderings(&mut self, force_recreate: bool) -> Result<(), RenderError> {
        if !self.target.check_ready() {
            return Err(RenderError::NotReady);
        }
        if !force_recreate && self.target.has_images() && !self.slots.is_empty() {
            return Ok(());
        }

        self.wait_queue_idle();
        self.slots.close(self.gpu.as_ref());

        let info = CreateImagesInfo {
            extent: self.settings.preferred_extent,
            formats: self.settings.formats.clone(),
            usage: self.settings.target_usage(self.peek.is_some()),
            color_space: self.settings.color_space,
            present_mode: self.settings.present_mode,
        };
        self.target
            .create_images(&info)
            .map_err(RenderError::TargetImages)?;

        let pre_rotate = self.target.images().pre_rotate();
        self.gpu
            .ensure_distortion_images(self.device.as_ref(), pre_rotate)
            .map_err(RenderError::DistortionImages)?;

        self.slots.create(
            self.gpu.as_ref(),
            self.target.images(),
            self.settings.use_compute,
        )?;

        let extent = self.target.images().extent();
        tracing::info!(
            target_name = self.target.name(),
            width = extent.width,
            height = extent.height,
            images = self.slots.len(),
            pre_rotate,
            "target images ready"
        );
        Ok(())
    }

    fn resize(&mut self) {
        if !self.target.check_ready() {
            // Resources stay until the target comes back.
            self.wait_queue_idle();
            self.slots.close(self.gpu.as_ref());
            return;
        }
        if let Err(err) = self.ensure_images_and_renderings(true) {
            tracing::error!("Failed to resize target: {err}");
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn mark(&mut self, point: TimingPoint, frame_id: FrameId) {
        let when = clock::now();
        self.target.mark_timing_point(point, frame_id, when);
        if let Some(trace) = self.trace.as_mut() {
            trace.on_timing_point(&TimingPointEvent {
                frame_id,
                point,
                when,
            });
        }
    }

    fn update_timings(&mut self) {
        if let Err(err) = self.target.update_timings() {
            tracing::warn!("Failed to update target timings: {err}");
        }
    }

    fn skip_frame(&mut self, frame_id: FrameId, reason: SkipReason) {
        self.mark(TimingPoint::SubmitBegin, frame_id);
        self.mark(TimingPoint::SubmitEnd, frame_id);
        self.frames.clear_rendering();
        self.emit_skipped(frame_id, reason);
    }

    fn emit_skipped(&mut self, frame_id: FrameId, reason: SkipReason) {
        tracing::trace!(%frame_id, ?reason, "frame skipped");
        if let Some(trace) = self.trace.as_mut() {
            trace.on_frame_skipped(&FrameSkippedEvent { frame_id, reason });
        }
    }

    fn wait_queue_idle(&self) {
        if let Err(err) = self.queue.wait_idle() {
            tracing::error!("Failed waiting for queue idle: {err}");
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.wait_queue_idle();
        self.slots.close(self.gpu.as_ref());
        self.scratch.free(self.gpu.as_ref());
        self.target.destroy();
    }
}

fn log_frame_lag(level: Level, frame_id: FrameId, lag: Duration) {
    let lag_ms = lag.as_secs_f64() * 1_000.0;
    if level == Level::ERROR {
        tracing::error!(%frame_id, lag_ms, "Probably missed frame");
    } else if level == Level::WARN {
        tracing::warn!(%frame_id, lag_ms, "Probably missed frame");
    } else if level == Level::INFO {
        tracing::info!(%frame_id, lag_ms, "Probably missed frame");
    } else if level == Level::DEBUG {
        tracing::debug!(%frame_id, lag_ms, "Probably missed frame");
    } else {
        tracing::trace!(%frame_id, lag_ms, "Probably missed frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::{DispatchPath, NullDevice, NullQueue, SubmissionLog};
    use crate::test_support::{ScriptHandle, ScriptedTarget, TestHmd};
    use std::sync::Mutex;

    struct Harness {
        renderer: Renderer,
        script: ScriptHandle,
        log: SubmissionLog,
        gpu: Arc<NullDevice>,
    }

    fn harness_with(settings: RendererSettings, gpu: Arc<NullDevice>) -> Harness {
        let (target, script) = ScriptedTarget::new(3);
        let (queue, log) = NullQueue::new();
        let renderer = Renderer::new(
            settings,
            Box::new(TestHmd::new()),
            gpu.clone(),
            SharedQueue::new(queue),
            Box::new(target),
        )
        .unwrap();
        Harness {
            renderer,
            script,
            log,
            gpu,
        }
    }

    fn harness() -> Harness {
        harness_with(RendererSettings::graphics(), Arc::new(NullDevice::new()))
    }

    fn next_frame(r: &mut Renderer) -> FrameId {
        let pacing = r.predict_frame();
        r.queue_frame(Frame::from(&pacing)).unwrap();
        pacing.frame_id
    }

    #[derive(Clone, Default)]
    struct Events(Arc<Mutex<Vec<(FrameId, SkipReason)>>>);

    impl TraceSink for Events {
        fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
            self.0.lock().unwrap().push((e.frame_id, e.reason));
        }
    }

    #[derive(Clone, Default)]
    struct Lags(Arc<Mutex<Vec<FrameLagEvent>>>);

    impl TraceSink for Lags {
        fn on_frame_lag(&mut self, e: &FrameLagEvent) {
            self.0.lock().unwrap().push(*e);
        }
    }

    /// Queues a frame that wants to be on the display at `desired_present`.
    fn frame_due_at(r: &mut Renderer, desired_present: Timestamp) -> FrameId {
        let pacing = r.predict_frame();
        let mut frame = Frame::from(&pacing);
        frame.desired_present = desired_present;
        r.queue_frame(frame).unwrap();
        pacing.frame_id
    }

    #[test]
    fn not_ready_frames_still_mark_submit_points() {
        let mut h = harness();
        let events = Events::default();
        h.renderer.set_trace_sink(Box::new(events.clone()));

        h.script.set_ready(false);
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(next_frame(&mut h.renderer));
            h.renderer.draw(&LayerFrame::new()).unwrap();
        }
        assert_eq!(h.log.len(), 0, "no GPU work while not ready");

        h.script.set_ready(true);
        ids.push(next_frame(&mut h.renderer));
        h.renderer.draw(&LayerFrame::new()).unwrap();
        assert_eq!(h.log.len(), 1, "ready frame submits once");

        for id in ids {
            let points = h.script.points_for(id);
            assert!(
                points.contains(&TimingPoint::SubmitBegin) && points.contains(&TimingPoint::SubmitEnd),
                "frame {id} lacks submit points: {points:?}"
            );
        }
        assert_eq!(events.0.lock().unwrap().len(), 3);
        assert!(!h.renderer.frames().rendering().is_valid(), "frame cleared");
    }

    #[test]
    fn stale_acquire_recreates_and_retries() {
        let mut h = harness();
        assert_eq!(h.script.create_calls(), 1, "images created up front");
        h.script
            .push_acquire(Err(TargetError::Stale(vk::Result::ERROR_OUT_OF_DATE_KHR)));
        h.script.push_acquire(Ok(1));

        next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();

        assert_eq!(h.script.create_calls(), 2, "stale images recreated once");
        let dispatches = h.gpu.dispatches();
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].slot, 1);
        assert_eq!(dispatches[0].path, DispatchPath::Graphics);
    }

    #[test]
    fn ensure_is_idempotent_across_frames() {
        let mut h = harness();
        for _ in 0..5 {
            next_frame(&mut h.renderer);
            h.renderer.draw(&LayerFrame::new()).unwrap();
        }
        assert_eq!(h.script.create_calls(), 1);
        assert_eq!(h.gpu.distortion_prepares(), 1);
        assert_eq!(h.log.len(), 5);
        let slots = h.renderer.slots();
        assert_eq!(slots.fence_count(), 3);
        assert_eq!(slots.fence_count(), slots.resource_count());
    }

    #[test]
    fn teardown_releases_gpu_objects() {
        let gpu = Arc::new(NullDevice::new());
        {
            let mut h = harness_with(RendererSettings::graphics(), gpu.clone());
            next_frame(&mut h.renderer);
            h.renderer.draw(&LayerFrame::new()).unwrap();
            assert!(gpu.live_fences() > 0);
        }
        assert_eq!(gpu.live_fences(), 0);
        assert_eq!(gpu.live_framebuffers(), 0);
        assert_eq!(gpu.live_render_passes(), 0);
        assert_eq!(gpu.live_scratch_images(), 0);
    }

    #[test]
    fn present_carries_frame_id_as_timeline_value() {
        let mut h = harness();
        let id = next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();
        let presents = h.script.lock().presents.clone();
        assert_eq!(presents, vec![(0, id.timeline_value())]);
    }

    #[test]
    fn stale_present_resizes() {
        let mut h = harness();
        h.script
            .push_present(Err(TargetError::Stale(vk::Result::SUBOPTIMAL_KHR)));
        next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();
        assert_eq!(h.script.create_calls(), 2);
        assert_eq!(h.renderer.slots().len(), 3);
    }

    #[test]
    fn compute_path_records_compute() {
        let mut h = harness_with(RendererSettings::compute(), Arc::new(NullDevice::new()));
        next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();
        assert_eq!(h.gpu.dispatches()[0].path, DispatchPath::Compute);
        assert_eq!(h.gpu.live_framebuffers(), 3 * 2, "only scratch framebuffers");
        let usage = h.script.lock().created_usage[0];
        assert_eq!(usage, vk::ImageUsageFlags::STORAGE);
    }

    #[test]
    fn draw_without_waited_frame_fails() {
        let mut h = harness();
        assert!(matches!(
            h.renderer.draw(&LayerFrame::new()),
            Err(RenderError::Frame(_))
        ));
    }

    #[test]
    fn distortion_failure_skips_frame() {
        let gpu = Arc::new(NullDevice::new());
        gpu.set_fail_distortion(true);
        let mut h = harness_with(RendererSettings::graphics(), gpu);
        let events = Events::default();
        h.renderer.set_trace_sink(Box::new(events.clone()));

        let id = next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();

        assert_eq!(h.log.len(), 0);
        assert_eq!(*events.0.lock().unwrap(), vec![(id, SkipReason::NoImage)]);
    }

    #[test]
    fn gpu_timings_reach_the_target() {
        let gpu = Arc::new(NullDevice::new());
        gpu.set_timestamps(true);
        let mut h = harness_with(RendererSettings::graphics(), gpu);
        let id = next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();
        assert_eq!(h.script.lock().gpu_infos, vec![id]);
    }

    #[test]
    fn fences_are_waited_and_reset() {
        let mut h = harness();
        for _ in 0..2 {
            next_frame(&mut h.renderer);
            h.renderer.draw(&LayerFrame::new()).unwrap();
        }
        let (waits, resets) = h.gpu.fence_ops();
        assert_eq!(resets, 2);
        assert_eq!(waits, 1, "first frame has nothing to wait for");
    }

    #[test]
    fn peek_is_rejected_on_compute() {
        let mut h = harness_with(RendererSettings::compute(), Arc::new(NullDevice::new()));
        let hmd = TestHmd::new();
        let (target, _) = ScriptedTarget::new(2);
        let peek = Peek::new(
            crate::peek::PeekEye::Both,
            hmd.hmd(),
            Box::new(target),
            h.gpu.clone(),
            Vec::new(),
            false,
        )
        .unwrap();
        assert!(matches!(
            h.renderer.attach_peek(peek),
            Err(PeekError::ComputeUnsupported)
        ));
    }

    #[test]
    fn peek_adds_transfer_usage_and_blits() {
        let mut h = harness();
        let hmd = TestHmd::new();
        let (target, peek_script) = ScriptedTarget::new(2);
        let peek = Peek::new(
            crate::peek::PeekEye::Both,
            hmd.hmd(),
            Box::new(target),
            h.gpu.clone(),
            vec![vk::Format::B8G8R8A8_SRGB],
            false,
        )
        .unwrap();
        h.renderer.attach_peek(peek).unwrap();

        let usage = *h.script.lock().created_usage.last().unwrap();
        assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));

        next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();
        assert_eq!(h.gpu.blits().len(), 1);
        assert_eq!(peek_script.lock().presents.len(), 1);
    }

    #[test]
    fn stale_acquire_with_failed_retry_skips_frame() {
        let mut h = harness();
        let events = Events::default();
        h.renderer.set_trace_sink(Box::new(events.clone()));
        h.script
            .push_acquire(Err(TargetError::Stale(vk::Result::ERROR_OUT_OF_DATE_KHR)));
        h.script
            .push_acquire(Err(TargetError::Stale(vk::Result::ERROR_OUT_OF_DATE_KHR)));

        let id = next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();

        assert_eq!(h.script.create_calls(), 2, "images recreated once");
        assert!(h.gpu.dispatches().is_empty(), "nothing recorded without an image");
        assert_eq!(h.log.len(), 0);
        assert_eq!(*events.0.lock().unwrap(), vec![(id, SkipReason::NoImage)]);
        let points = h.script.points_for(id);
        assert!(
            points.ends_with(&[TimingPoint::SubmitBegin, TimingPoint::SubmitEnd]),
            "skipped frame still closes its submit window: {points:?}"
        );
        assert!(!h.renderer.frames().rendering().is_valid(), "frame cleared");

        let next = next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();
        let dispatches = h.gpu.dispatches();
        assert_eq!(dispatches.len(), 1, "next frame renders normally");
        assert_eq!(dispatches[0].frame_id, next);
        assert_eq!(h.log.len(), 1);
    }

    #[test]
    fn record_failure_releases_frame_and_scratch() {
        let gpu = Arc::new(NullDevice::new());
        gpu.set_fail_record(true);
        let mut h = harness_with(RendererSettings::graphics(), gpu);
        let events = Events::default();
        h.renderer.set_trace_sink(Box::new(events.clone()));

        // No layers, so every view renders through scratch.
        let id = next_frame(&mut h.renderer);
        let err = h.renderer.draw(&LayerFrame::new()).unwrap_err();
        assert!(
            matches!(err, RenderError::Vulkan(vk::Result::ERROR_DEVICE_LOST)),
            "unexpected error: {err}"
        );

        assert_eq!(h.log.len(), 0, "nothing submitted");
        assert!(h.script.lock().presents.is_empty(), "nothing presented");
        assert_eq!(*events.0.lock().unwrap(), vec![(id, SkipReason::DispatchFailed)]);
        assert!(!h.renderer.frames().rendering().is_valid(), "frame cleared");
        let scratch = h.renderer.scratch();
        for view in 0..scratch.view_count() {
            assert_eq!(scratch.outstanding(view), None, "view {view} slot still held");
            assert!(scratch.latest(view).is_none(), "failed content published");
        }

        h.gpu.set_fail_record(false);
        let next = next_frame(&mut h.renderer);
        h.renderer.draw(&LayerFrame::new()).unwrap();
        assert_eq!(h.log.len(), 1, "next frame submits");
        assert_eq!(h.gpu.dispatches()[0].frame_id, next);
        assert!(h.renderer.scratch().latest(0).is_some());
    }

    #[test]
    fn late_frame_reports_lag_when_blocking_in_acquire() {
        let mut h = harness();
        let lags = Lags::default();
        h.renderer.set_trace_sink(Box::new(lags.clone()));
        h.script.set_acquire_delay(Duration::from_millis(5));

        let id = frame_due_at(&mut h.renderer, Timestamp::ZERO);
        h.renderer.draw(&LayerFrame::new()).unwrap();

        assert_eq!(h.script.lock().acquires.len(), 2, "next image acquired after present");
        let lags = lags.0.lock().unwrap();
        assert_eq!(lags.len(), 1, "got {lags:?}");
        assert_eq!(lags[0].frame_id, id);
        assert_eq!(lags[0].desired_present, Timestamp::ZERO);
        assert!(lags[0].lag() > MILLISECOND, "lag {:?}", lags[0].lag());
    }

    #[test]
    fn late_frame_reports_lag_when_waiting_for_present() {
        let mut h = harness();
        let lags = Lags::default();
        h.renderer.set_trace_sink(Box::new(lags.clone()));
        h.script.set_present_wait(Some(Duration::from_millis(5)));

        let id = frame_due_at(&mut h.renderer, Timestamp::ZERO);
        h.renderer.draw(&LayerFrame::new()).unwrap();

        assert_eq!(h.script.lock().present_waits, 1, "one present wait per frame");
        assert_eq!(h.script.lock().acquires.len(), 1, "no acquire ahead of time");
        let lags = lags.0.lock().unwrap();
        assert_eq!(lags.len(), 1, "got {lags:?}");
        assert_eq!(lags[0].frame_id, id);
    }

    #[test]
    fn on_time_frame_reports_no_lag() {
        let mut h = harness();
        let lags = Lags::default();
        h.renderer.set_trace_sink(Box::new(lags.clone()));
        h.script.set_present_wait(Some(Duration::from_millis(5)));

        frame_due_at(&mut h.renderer, clock::now() + Duration::from_secs(1));
        h.renderer.draw(&LayerFrame::new()).unwrap();

        assert!(lags.0.lock().unwrap().is_empty(), "frame was not late");
    }
}
