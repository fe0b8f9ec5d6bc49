// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A GPU-less [`RenderDevice`] and [`Queue`].
//!
//! Handles are unique counters, work completes instantly and every call is
//! recorded, which makes these useful for headless runs and for checking the
//! renderer's resource discipline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ash::vk::{self, Handle};
use parallax_core::device::Device;
use parallax_core::frame::FrameId;
use parallax_core::time::Timestamp;

use crate::clock;
use crate::gpu::{
    BlitRequest, ComputeDispatch, GraphicsDispatch, Queue, RenderDevice, ScratchImage, Submission,
};

/// Which path recorded a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchPath {
    /// Render-pass based.
    Graphics,
    /// Compute based.
    Compute,
}

/// One recorded dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Frame.
    pub frame_id: FrameId,
    /// Target slot written.
    pub slot: u32,
    /// Path taken.
    pub path: DispatchPath,
    /// Number of views recorded.
    pub view_count: usize,
}

#[derive(Debug, Default)]
struct NullState {
    fences: HashSet<u64>,
    render_passes: HashSet<u64>,
    framebuffers: HashSet<u64>,
    scratch_images: HashSet<u64>,
    fences_created: usize,
    fence_waits: usize,
    fence_resets: usize,
    distortion_prepares: usize,
    dispatches: Vec<DispatchRecord>,
    blits: Vec<BlitRequest>,
}

/// A device that owns no GPU.
#[derive(Debug, Default)]
pub struct NullDevice {
    next_handle: AtomicU64,
    fail_distortion: AtomicBool,
    fail_record: AtomicBool,
    timestamps: AtomicBool,
    state: Mutex<NullState>,
}

impl NullDevice {
    /// Creates a device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Makes [`RenderDevice::ensure_distortion_images`] fail.
    pub fn set_fail_distortion(&self, fail: bool) {
        self.fail_distortion.store(fail, Ordering::Relaxed);
    }

    /// Makes recording fail once the scratch slots have been written.
    pub fn set_fail_record(&self, fail: bool) {
        self.fail_record.store(fail, Ordering::Relaxed);
    }

    /// Makes [`RenderDevice::gpu_timestamps`] report a window.
    pub fn set_timestamps(&self, enabled: bool) {
        self.timestamps.store(enabled, Ordering::Relaxed);
    }

    fn state(&self) -> MutexGuard<'_, NullState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Live fences.
    #[must_use]
    pub fn live_fences(&self) -> usize {
        self.state().fences.len()
    }

    /// Fences created over the device's lifetime.
    #[must_use]
    pub fn fences_created(&self) -> usize {
        self.state().fences_created
    }

    /// Live render passes.
    #[must_use]
    pub fn live_render_passes(&self) -> usize {
        self.state().render_passes.len()
    }

    /// Live framebuffers.
    #[must_use]
    pub fn live_framebuffers(&self) -> usize {
        self.state().framebuffers.len()
    }

    /// Live scratch images.
    #[must_use]
    pub fn live_scratch_images(&self) -> usize {
        self.state().scratch_images.len()
    }

    /// Fence waits and resets so far.
    #[must_use]
    pub fn fence_ops(&self) -> (usize, usize) {
        let s = self.state();
        (s.fence_waits, s.fence_resets)
    }

    /// Distortion preparations so far.
    #[must_use]
    pub fn distortion_prepares(&self) -> usize {
        self.state().distortion_prepares
    }

    /// Recorded dispatches.
    #[must_use]
    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.state().dispatches.clone()
    }

    /// Recorded blits.
    #[must_use]
    pub fn blits(&self) -> Vec<BlitRequest> {
        self.state().blits.clone()
    }
}

impl RenderDevice for NullDevice {
    fn create_fence(&self, _signaled: bool) -> Result<vk::Fence, vk::Result> {
        let raw = self.handle();
        let mut s = self.state();
        s.fences.insert(raw);
        s.fences_created += 1;
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.state().fences.remove(&fence.as_raw());
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: Duration) -> Result<(), vk::Result> {
        let mut s = self.state();
        if !s.fences.contains(&fence.as_raw()) {
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        s.fence_waits += 1;
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<(), vk::Result> {
        let mut s = self.state();
        if !s.fences.contains(&fence.as_raw()) {
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        s.fence_resets += 1;
        Ok(())
    }

    fn create_render_pass(
        &self,
        _format: vk::Format,
        _final_layout: vk::ImageLayout,
    ) -> Result<vk::RenderPass, vk::Result> {
        let raw = self.handle();
        self.state().render_passes.insert(raw);
        Ok(vk::RenderPass::from_raw(raw))
    }

    fn destroy_render_pass(&self, pass: vk::RenderPass) {
        self.state().render_passes.remove(&pass.as_raw());
    }

    fn create_framebuffer(
        &self,
        pass: vk::RenderPass,
        _view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer, vk::Result> {
        let raw = self.handle();
        let mut s = self.state();
        if !s.render_passes.contains(&pass.as_raw()) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        s.framebuffers.insert(raw);
        Ok(vk::Framebuffer::from_raw(raw))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.state().framebuffers.remove(&framebuffer.as_raw());
    }

    fn create_scratch_image(
        &self,
        _extent: vk::Extent2D,
        _format: vk::Format,
        mutable: bool,
    ) -> Result<ScratchImage, vk::Result> {
        let image = self.handle();
        let sample_view = vk::ImageView::from_raw(self.handle());
        let storage_view = if mutable {
            vk::ImageView::from_raw(self.handle())
        } else {
            sample_view
        };
        self.state().scratch_images.insert(image);
        Ok(ScratchImage {
            image: vk::Image::from_raw(image),
            sample_view,
            storage_view,
        })
    }

    fn destroy_scratch_image(&self, image: &ScratchImage) {
        self.state().scratch_images.remove(&image.image.as_raw());
    }

    fn ensure_distortion_images(
        &self,
        _device: &dyn Device,
        _pre_rotate: bool,
    ) -> Result<(), vk::Result> {
        if self.fail_distortion.load(Ordering::Relaxed) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        self.state().distortion_prepares += 1;
        Ok(())
    }

    fn record_graphics(
        &self,
        dispatch: &mut GraphicsDispatch<'_>,
    ) -> Result<vk::CommandBuffer, vk::Result> {
        if !dispatch.layers.is_fast_path() {
            for view in 0..dispatch.views.len() {
                dispatch.scratch.mark_used(view);
            }
        }
        if self.fail_record.load(Ordering::Relaxed) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        self.state().dispatches.push(DispatchRecord {
            frame_id: dispatch.frame_id,
            slot: dispatch.slot,
            path: DispatchPath::Graphics,
            view_count: dispatch.views.len(),
        });
        Ok(vk::CommandBuffer::from_raw(self.handle()))
    }

    fn record_compute(
        &self,
        dispatch: &mut ComputeDispatch<'_>,
    ) -> Result<vk::CommandBuffer, vk::Result> {
        if !dispatch.layers.is_fast_path() {
            for view in 0..dispatch.views.len() {
                dispatch.scratch.mark_used(view);
            }
        }
        if self.fail_record.load(Ordering::Relaxed) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        self.state().dispatches.push(DispatchRecord {
            frame_id: dispatch.frame_id,
            slot: dispatch.slot,
            path: DispatchPath::Compute,
            view_count: dispatch.views.len(),
        });
        Ok(vk::CommandBuffer::from_raw(self.handle()))
    }

    fn record_blit(&self, blit: &BlitRequest) -> Result<vk::CommandBuffer, vk::Result> {
        self.state().blits.push(*blit);
        Ok(vk::CommandBuffer::from_raw(self.handle()))
    }

    fn gpu_timestamps(&self) -> Option<(Timestamp, Timestamp)> {
        if !self.timestamps.load(Ordering::Relaxed) {
            return None;
        }
        let end = clock::now();
        Some((end - Duration::from_micros(500), end))
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Submissions seen by a [`NullQueue`], shared with the caller.
#[derive(Clone, Debug, Default)]
pub struct SubmissionLog {
    inner: Arc<Mutex<Vec<Submission>>>,
    idle_waits: Arc<AtomicU64>,
}

impl SubmissionLog {
    /// All submissions so far.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of submissions so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of idle waits so far.
    #[must_use]
    pub fn idle_waits(&self) -> u64 {
        self.idle_waits.load(Ordering::Relaxed)
    }
}

/// A queue that completes everything immediately.
#[derive(Debug, Default)]
pub struct NullQueue {
    log: SubmissionLog,
}

impl NullQueue {
    /// Creates a queue and a handle to its log.
    #[must_use]
    pub fn new() -> (Self, SubmissionLog) {
        let queue = Self::default();
        let log = queue.log.clone();
        (queue, log)
    }
}

impl Queue for NullQueue {
    fn raw(&self) -> vk::Queue {
        vk::Queue::null()
    }

    fn submit(&mut self, submission: &Submission) -> Result<(), vk::Result> {
        self.log
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*submission);
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<(), vk::Result> {
        self.log.idle_waits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
