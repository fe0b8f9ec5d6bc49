// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The presentation target abstraction.
//!
//! A [`Target`] is whatever the renderer presents into: a swapchain, a debug
//! image ring or nothing at all. Its image set follows a small state machine
//! held in [`TargetImages`]:
//!
//! ```text
//!   Created ──create_images──► ImagesReady ──begin_resize──► Resizing
//!                                   ▲                           │
//!                                   └────────create_images──────┘
//!   any ──destroy──► Destroyed (terminal)
//! ```
//!
//! Images are only valid while the state is `ImagesReady`.

use core::time::Duration;

use ash::vk;
use parallax_core::frame::FrameId;
use parallax_core::pacing::{FramePacing, TimingPoint};
use parallax_core::time::Timestamp;

use crate::error::TargetError;
use crate::gpu::SharedQueue;

/// One presentable image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetImage {
    /// Image handle.
    pub image: vk::Image,
    /// View used for rendering or storage writes.
    pub view: vk::ImageView,
}

/// Parameters of [`Target::create_images`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateImagesInfo {
    /// Requested size; targets may pick another.
    pub extent: vk::Extent2D,
    /// Acceptable formats, most preferred first.
    pub formats: Vec<vk::Format>,
    /// How the renderer will use the images.
    pub usage: vk::ImageUsageFlags,
    /// Requested color space.
    pub color_space: vk::ColorSpaceKHR,
    /// Requested present mode.
    pub present_mode: vk::PresentModeKHR,
}

/// Lifecycle state of a target's image set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// No images yet.
    Created,
    /// Images are valid.
    ImagesReady,
    /// Old images are gone and new ones not yet created.
    Resizing,
    /// The target is gone for good.
    Destroyed,
}

/// The current image set of a target.
#[derive(Clone, Debug)]
pub struct TargetImages {
    state: TargetState,
    extent: vk::Extent2D,
    format: vk::Format,
    surface_transform: vk::SurfaceTransformFlagsKHR,
    final_layout: vk::ImageLayout,
    images: Vec<TargetImage>,
}

impl TargetImages {
    /// An empty image set in the `Created` state.
    #[must_use]
    pub fn new(final_layout: vk::ImageLayout) -> Self {
        Self {
            state: TargetState::Created,
            extent: vk::Extent2D::default(),
            format: vk::Format::UNDEFINED,
            surface_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            final_layout,
            images: Vec::new(),
        }
    }

    /// Installs a new image set, moving to `ImagesReady`.
    ///
    /// Fails once the target has been destroyed.
    pub fn set(
        &mut self,
        extent: vk::Extent2D,
        format: vk::Format,
        surface_transform: vk::SurfaceTransformFlagsKHR,
        images: Vec<TargetImage>,
    ) -> Result<(), TargetError> {
        if self.state == TargetState::Destroyed {
            return Err(TargetError::Destroyed);
        }
        self.extent = extent;
        self.format = format;
        self.surface_transform = surface_transform;
        self.images = images;
        self.state = TargetState::ImagesReady;
        Ok(())
    }

    /// Drops the current images ahead of recreation.
    pub fn begin_resize(&mut self) {
        if self.state == TargetState::ImagesReady {
            self.images.clear();
            self.state = TargetState::Resizing;
        }
    }

    /// Drops the images for good.
    pub fn destroy(&mut self) {
        self.images.clear();
        self.extent = vk::Extent2D::default();
        self.state = TargetState::Destroyed;
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Returns `true` while images are valid.
    #[inline]
    #[must_use]
    pub fn has_images(&self) -> bool {
        self.state == TargetState::ImagesReady && !self.images.is_empty()
    }

    /// Image size.
    #[inline]
    #[must_use]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Image format.
    #[inline]
    #[must_use]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Rotation the presentation engine applies.
    #[inline]
    #[must_use]
    pub fn surface_transform(&self) -> vk::SurfaceTransformFlagsKHR {
        self.surface_transform
    }

    /// Layout images must be in when presented.
    #[inline]
    #[must_use]
    pub fn final_layout(&self) -> vk::ImageLayout {
        self.final_layout
    }

    /// The images, empty unless `ImagesReady`.
    #[inline]
    #[must_use]
    pub fn images(&self) -> &[TargetImage] {
        &self.images
    }

    /// Number of images.
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::try_from(self.images.len()).unwrap_or(u32::MAX)
    }

    /// Image at `index`.
    pub fn get(&self, index: u32) -> Result<&TargetImage, TargetError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.images.get(i))
            .ok_or(TargetError::BadIndex {
                index,
                count: self.count(),
            })
    }

    /// Returns `true` if the renderer must compensate a 90° or 270°
    /// surface rotation.
    #[must_use]
    pub fn pre_rotate(&self) -> bool {
        self.surface_transform.intersects(
            vk::SurfaceTransformFlagsKHR::ROTATE_90 | vk::SurfaceTransformFlagsKHR::ROTATE_270,
        )
    }
}

/// Semaphores the renderer should wait on and signal around its submit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TargetSemaphores {
    /// Signaled when the acquired image may be written.
    pub present_complete: Option<vk::Semaphore>,
    /// Signaled by the renderer when the image may be presented.
    pub render_complete: Option<vk::Semaphore>,
    /// `render_complete` is a timeline semaphore fed with frame ids.
    pub render_complete_is_timeline: bool,
}

/// A presentation target.
pub trait Target {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// The current image set.
    fn images(&self) -> &TargetImages;

    /// Whether the target can currently produce images. No side effects.
    fn check_ready(&self) -> bool;

    /// (Re)creates the image set. Only valid while `check_ready` holds.
    fn create_images(&mut self, info: &CreateImagesInfo) -> Result<(), TargetError>;

    /// Whether images are currently valid.
    fn has_images(&self) -> bool {
        self.images().has_images()
    }

    /// Acquires the next image, or [`TargetError::Stale`].
    fn acquire(&mut self) -> Result<u32, TargetError>;

    /// Presents an acquired image, or [`TargetError::Stale`].
    fn present(
        &mut self,
        queue: &SharedQueue,
        index: u32,
        timeline_value: u64,
        desired_present: Timestamp,
        present_slop: Duration,
    ) -> Result<(), TargetError>;

    /// Blocks until the last present reached the display, or `timeout`.
    ///
    /// Targets without this capability return [`TargetError::Unsupported`].
    fn wait_for_present(&mut self, timeout: Duration) -> Result<(), TargetError> {
        _ = timeout;
        Err(TargetError::Unsupported)
    }

    /// Flushes pending window-system work.
    fn flush(&mut self) {}

    /// Predicts the next frame.
    fn calc_frame_pacing(&mut self, now: Timestamp) -> FramePacing;

    /// Records a timing point of a frame.
    fn mark_timing_point(&mut self, point: TimingPoint, frame_id: FrameId, when: Timestamp);

    /// Polls presentation feedback.
    fn update_timings(&mut self) -> Result<(), TargetError> {
        Ok(())
    }

    /// Records the GPU execution window of a frame.
    fn info_gpu(
        &mut self,
        frame_id: FrameId,
        gpu_start: Timestamp,
        gpu_end: Timestamp,
        when: Timestamp,
    );

    /// Semaphores to use around the renderer's submit.
    fn semaphores(&self) -> TargetSemaphores {
        TargetSemaphores::default()
    }

    /// Releases the images for good.
    fn destroy(&mut self);
}
