// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A target that renders into offscreen images and never shows them.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use parallax_core::frame::FrameId;
use parallax_core::pacing::{FramePacing, TimingPoint};
use parallax_core::time::Timestamp;

use crate::clock;
use crate::error::TargetError;
use crate::gpu::{RenderDevice, ScratchImage, SharedQueue};
use crate::target::{CreateImagesInfo, Target, TargetImage, TargetImages};

use super::TargetPacer;

/// Offscreen images acquired round robin; presenting is a no-op.
pub struct HeadlessTarget {
    gpu: Arc<dyn RenderDevice>,
    image_count: u32,
    backing: Vec<ScratchImage>,
    images: TargetImages,
    next: u32,
    pacer: TargetPacer,
}

impl core::fmt::Debug for HeadlessTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HeadlessTarget")
            .field("image_count", &self.image_count)
            .field("images", &self.images)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl HeadlessTarget {
    /// Default number of images.
    pub const DEFAULT_IMAGE_COUNT: u32 = 3;

    /// Creates a target with `image_count` images paced at `frame_period`.
    #[must_use]
    pub fn new(gpu: Arc<dyn RenderDevice>, image_count: u32, frame_period: Duration) -> Self {
        Self {
            gpu,
            image_count: image_count.max(1),
            backing: Vec::new(),
            images: TargetImages::new(vk::ImageLayout::PRESENT_SRC_KHR),
            next: 0,
            pacer: TargetPacer::new(frame_period, clock::now()),
        }
    }

    fn free_backing(&mut self) {
        for image in self.backing.drain(..) {
            self.gpu.destroy_scratch_image(&image);
        }
    }
}

impl Target for HeadlessTarget {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn images(&self) -> &TargetImages {
        &self.images
    }

    fn check_ready(&self) -> bool {
        true
    }

    fn create_images(&mut self, info: &CreateImagesInfo) -> Result<(), TargetError> {
        let format = info
            .formats
            .first()
            .copied()
            .ok_or_else(|| TargetError::NoSupportedFormat(Vec::new()))?;

        self.images.begin_resize();
        self.free_backing();
        for _ in 0..self.image_count {
            match self.gpu.create_scratch_image(info.extent, format, false) {
                Ok(image) => self.backing.push(image),
                Err(err) => {
                    self.free_backing();
                    return Err(err.into());
                }
            }
        }

        let images = self
            .backing
            .iter()
            .map(|b| TargetImage {
                image: b.image,
                view: b.storage_view,
            })
            .collect();
        self.next = 0;
        tracing::debug!(
            width = info.extent.width,
            height = info.extent.height,
            ?format,
            "created headless images"
        );
        self.images.set(
            info.extent,
            format,
            vk::SurfaceTransformFlagsKHR::IDENTITY,
            images,
        )
    }

    fn acquire(&mut self) -> Result<u32, TargetError> {
        if !self.images.has_images() {
            return Err(TargetError::NotReady);
        }
        let index = self.next;
        self.next = (self.next + 1) % self.images.count();
        Ok(index)
    }

    fn present(
        &mut self,
        _queue: &SharedQueue,
        index: u32,
        _timeline_value: u64,
        _desired_present: Timestamp,
        _present_slop: Duration,
    ) -> Result<(), TargetError> {
        self.images.get(index).map(|_| ())
    }

    fn calc_frame_pacing(&mut self, now: Timestamp) -> FramePacing {
        self.pacer.predict(now)
    }

    fn mark_timing_point(&mut self, point: TimingPoint, frame_id: FrameId, when: Timestamp) {
        self.pacer.mark(point, frame_id, when);
    }

    fn info_gpu(
        &mut self,
        frame_id: FrameId,
        gpu_start: Timestamp,
        gpu_end: Timestamp,
        when: Timestamp,
    ) {
        self.pacer.info_gpu(frame_id, gpu_start, gpu_end, when);
    }

    fn destroy(&mut self) {
        self.free_backing();
        self.images.destroy();
    }
}

impl Drop for HeadlessTarget {
    fn drop(&mut self) {
        self.free_backing();
    }
}
