// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A target backed by a scratch ring, shown by a debug UI instead of a
//! display.
//!
//! The ring allocates `R8G8B8A8_SRGB` images with a linear storage view, so
//! the only formats it can honour are `R8G8B8A8_SRGB` and `R8G8B8A8_UNORM`.
//! A request for the `B8G8R8A8` variants is mapped onto the matching
//! `R8G8B8A8` format with a warning.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use parallax_core::frame::FrameId;
use parallax_core::pacing::{FramePacing, TimingPoint};
use parallax_core::time::Timestamp;

use crate::clock;
use crate::error::TargetError;
use crate::gpu::{RenderDevice, ScratchImage, SharedQueue};
use crate::scratch::ScratchRing;
use crate::target::{CreateImagesInfo, Target, TargetImage, TargetImages};

use super::TargetPacer;

/// Result of [`select_format`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatChoice {
    /// Format the images will have.
    pub format: vk::Format,
    /// Whether the request was for a format the ring cannot allocate.
    pub converted: bool,
}

/// Picks the ring format for a list of requested formats.
///
/// The first `R8G8B8A8` format wins outright. The first `B8G8R8A8` format
/// only decides between sRGB and UNORM, and the search goes on in case a
/// better match follows.
pub fn select_format(formats: &[vk::Format]) -> Result<FormatChoice, TargetError> {
    let mut choice: Option<FormatChoice> = None;
    for &format in formats {
        let converted = choice.is_some_and(|c| c.converted);
        match format {
            vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SRGB => {
                return Ok(FormatChoice {
                    format,
                    converted: false,
                });
            }
            vk::Format::B8G8R8A8_UNORM if !converted => {
                choice = Some(FormatChoice {
                    format: vk::Format::R8G8B8A8_UNORM,
                    converted: true,
                });
            }
            vk::Format::B8G8R8A8_SRGB if !converted => {
                choice = Some(FormatChoice {
                    format: vk::Format::R8G8B8A8_SRGB,
                    converted: true,
                });
            }
            _ => {}
        }
    }
    choice.ok_or_else(|| TargetError::NoSupportedFormat(formats.to_vec()))
}

/// A ring of images handed to a debug viewer after every present.
pub struct DebugImageTarget {
    gpu: Arc<dyn RenderDevice>,
    ring: Option<ScratchRing>,
    images: TargetImages,
    acquired: Option<u32>,
    pacer: TargetPacer,
}

impl core::fmt::Debug for DebugImageTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DebugImageTarget")
            .field("images", &self.images)
            .field("acquired", &self.acquired)
            .finish_non_exhaustive()
    }
}

impl DebugImageTarget {
    /// Creates a target paced at `frame_period`.
    #[must_use]
    pub fn new(gpu: Arc<dyn RenderDevice>, frame_period: Duration) -> Self {
        Self {
            gpu,
            ring: None,
            images: TargetImages::new(vk::ImageLayout::PRESENT_SRC_KHR),
            acquired: None,
            pacer: TargetPacer::new(frame_period, clock::now()),
        }
    }

    /// The most recently presented image, for the viewer.
    #[must_use]
    pub fn latest(&self) -> Option<&ScratchImage> {
        let ring = self.ring.as_ref()?;
        ring.image(ring.last_done()?)
    }

    fn free_ring(&mut self) {
        if let Some(mut ring) = self.ring.take() {
            ring.destroy(self.gpu.as_ref());
        }
        self.acquired = None;
    }
}

impl Target for DebugImageTarget {
    fn name(&self) -> &'static str {
        "debug image"
    }

    fn images(&self) -> &TargetImages {
        &self.images
    }

    fn check_ready(&self) -> bool {
        true
    }

    fn create_images(&mut self, info: &CreateImagesInfo) -> Result<(), TargetError> {
        let choice = select_format(&info.formats)?;
        if choice.converted {
            tracing::warn!("Ignoring the format and picking something we use.");
        }

        self.images.begin_resize();
        self.free_ring();
        let ring = ScratchRing::create(self.gpu.as_ref(), info.extent, vk::Format::R8G8B8A8_SRGB)?;
        let srgb = choice.format == vk::Format::R8G8B8A8_SRGB;
        let images = ring
            .images()
            .iter()
            .map(|image| TargetImage {
                image: image.image,
                view: if srgb {
                    image.sample_view
                } else {
                    image.storage_view
                },
            })
            .collect();
        self.ring = Some(ring);
        self.images.set(
            info.extent,
            choice.format,
            vk::SurfaceTransformFlagsKHR::IDENTITY,
            images,
        )
    }

    fn has_images(&self) -> bool {
        self.ring.is_some() && self.images.has_images()
    }

    fn acquire(&mut self) -> Result<u32, TargetError> {
        if let Some(index) = self.acquired {
            return Err(TargetError::AlreadyAcquired(index));
        }
        let ring = self.ring.as_mut().ok_or(TargetError::NotReady)?;
        let index = ring.get();
        self.acquired = Some(index);
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
        if self.acquired != Some(index) {
            return Err(TargetError::BadIndex {
                index,
                count: self.images.count(),
            });
        }
        let ring = self.ring.as_mut().ok_or(TargetError::NotReady)?;
        ring.done(index);
        self.acquired = None;
        Ok(())
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
        self.free_ring();
        self.images.destroy();
    }
}

impl Drop for DebugImageTarget {
    fn drop(&mut self) {
        self.free_ring();
    }
}
