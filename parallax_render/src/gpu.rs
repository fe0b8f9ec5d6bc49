// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render-resource seam.
//!
//! [`RenderDevice`] is everything the renderer asks of the GPU library: fences,
//! render passes, framebuffers, scratch images, distortion resources and
//! command recording. Command content is the device's business; the renderer
//! only decides what gets recorded into which slot and when it is submitted.
//!
//! All queue work goes through a [`SharedQueue`], a single mutex that
//! serializes submissions and presentations regardless of which thread
//! issues them.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ash::vk;
use parallax_core::device::Device;
use parallax_core::frame::FrameId;
use parallax_core::time::Timestamp;

use crate::layer::LayerFrame;
use crate::scratch::ScratchAccess;
use crate::view::ViewData;

/// A scratch image with its two views.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScratchImage {
    /// The image.
    pub image: vk::Image,
    /// View used for sampling and as a color attachment.
    pub sample_view: vk::ImageView,
    /// Linear view for storage writes; equals `sample_view` unless the
    /// image was created mutable.
    pub storage_view: vk::ImageView,
}

/// Everything the graphics path needs to record one frame.
#[derive(Debug)]
pub struct GraphicsDispatch<'a> {
    /// Frame being recorded.
    pub frame_id: FrameId,
    /// Layers to compose.
    pub layers: &'a LayerFrame,
    /// Per-view viewport, rotation and pose data.
    pub views: &'a [ViewData],
    /// Acquired target slot.
    pub slot: u32,
    /// Shared render pass of the target format.
    pub render_pass: vk::RenderPass,
    /// Framebuffer of `slot`.
    pub framebuffer: vk::Framebuffer,
    /// Target size.
    pub extent: vk::Extent2D,
    /// This frame's scratch images.
    pub scratch: ScratchAccess<'a>,
}

/// Everything the compute path needs to record one frame.
#[derive(Debug)]
pub struct ComputeDispatch<'a> {
    /// Frame being recorded.
    pub frame_id: FrameId,
    /// Layers to compose.
    pub layers: &'a LayerFrame,
    /// Per-view viewport and pose data.
    pub views: &'a [ViewData],
    /// Acquired target slot.
    pub slot: u32,
    /// Target image of `slot`.
    pub image: vk::Image,
    /// Storage view of `slot`.
    pub storage_view: vk::ImageView,
    /// Target size.
    pub extent: vk::Extent2D,
    /// This frame's scratch images.
    pub scratch: ScratchAccess<'a>,
}

/// A single full-image blit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlitRequest {
    /// Source image, in `src_layout`.
    pub src: vk::Image,
    /// Layout of the source while blitting.
    pub src_layout: vk::ImageLayout,
    /// Source size.
    pub src_extent: vk::Extent2D,
    /// Destination image.
    pub dst: vk::Image,
    /// Destination size.
    pub dst_extent: vk::Extent2D,
}

/// GPU objects the renderer creates, and command recording.
pub trait RenderDevice {
    /// Creates a fence, optionally already signaled.
    fn create_fence(&self, signaled: bool) -> Result<vk::Fence, vk::Result>;

    /// Destroys a fence.
    fn destroy_fence(&self, fence: vk::Fence);

    /// Blocks until `fence` is signaled or `timeout` passes.
    fn wait_for_fence(&self, fence: vk::Fence, timeout: Duration) -> Result<(), vk::Result>;

    /// Returns `fence` to the unsignaled state.
    fn reset_fence(&self, fence: vk::Fence) -> Result<(), vk::Result>;

    /// Creates a single-subpass render pass for `format`.
    fn create_render_pass(
        &self,
        format: vk::Format,
        final_layout: vk::ImageLayout,
    ) -> Result<vk::RenderPass, vk::Result>;

    /// Destroys a render pass. Every framebuffer made from it must already
    /// be gone.
    fn destroy_render_pass(&self, pass: vk::RenderPass);

    /// Creates a framebuffer for one image view.
    fn create_framebuffer(
        &self,
        pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer, vk::Result>;

    /// Destroys a framebuffer.
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Creates a scratch image. A `mutable` image gets a separate linear
    /// storage view over its sRGB sample view.
    fn create_scratch_image(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        mutable: bool,
    ) -> Result<ScratchImage, vk::Result>;

    /// Destroys a scratch image and its views.
    fn destroy_scratch_image(&self, image: &ScratchImage);

    /// Prepares distortion lookup images for `device`, rotated when
    /// `pre_rotate` is set.
    fn ensure_distortion_images(&self, device: &dyn Device, pre_rotate: bool)
    -> Result<(), vk::Result>;

    /// Records the graphics path into a command buffer.
    fn record_graphics(
        &self,
        dispatch: &mut GraphicsDispatch<'_>,
    ) -> Result<vk::CommandBuffer, vk::Result>;

    /// Records the compute path into a command buffer.
    fn record_compute(
        &self,
        dispatch: &mut ComputeDispatch<'_>,
    ) -> Result<vk::CommandBuffer, vk::Result>;

    /// Records a blit into a command buffer.
    fn record_blit(&self, blit: &BlitRequest) -> Result<vk::CommandBuffer, vk::Result>;

    /// GPU start and end of the last submitted frame, when timestamp queries
    /// are available.
    fn gpu_timestamps(&self) -> Option<(Timestamp, Timestamp)> {
        None
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// A queue submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submission {
    /// Recorded commands.
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore to wait on before executing, with its stage.
    pub wait: Option<(vk::Semaphore, vk::PipelineStageFlags)>,
    /// Semaphore to signal when done.
    pub signal: Option<vk::Semaphore>,
    /// Value to signal if `signal` is a timeline semaphore.
    pub timeline_value: Option<u64>,
    /// Fence to signal when done.
    pub fence: vk::Fence,
}

/// A GPU queue.
pub trait Queue: Send {
    /// Raw handle for presentation engines.
    fn raw(&self) -> vk::Queue;

    /// Submits work.
    fn submit(&mut self, submission: &Submission) -> Result<(), vk::Result>;

    /// Blocks until the queue is idle.
    fn wait_idle(&mut self) -> Result<(), vk::Result>;
}

/// A queue shared between threads behind one mutex.
#[derive(Clone)]
pub struct SharedQueue {
    inner: Arc<Mutex<Box<dyn Queue>>>,
}

impl SharedQueue {
    /// Wraps a queue.
    #[must_use]
    pub fn new(queue: impl Queue + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(queue))),
        }
    }

    /// Locks the queue. A poisoned lock is recovered since the queue holds
    /// no invariants of its own.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Queue>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submits under the lock.
    pub fn submit(&self, submission: &Submission) -> Result<(), vk::Result> {
        self.lock().submit(submission)
    }

    /// Waits for idle under the lock.
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        self.lock().wait_idle()
    }
}

impl fmt::Debug for SharedQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedQueue").finish_non_exhaustive()
    }
}
