// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A window-system swapchain target.
//!
//! The window-system specifics (surface creation, swapchain recreation,
//! present extensions) live behind [`Surface`]. [`SwapchainTarget`] adds the
//! image-set state machine, pacing and presentation feedback on top.
//!
//! Presentation feedback arrives asynchronously and is drained by
//! [`Target::update_timings`] into a bounded queue with a `drop_oldest`
//! policy, so a stalled renderer keeps only the newest feedback.

use std::collections::VecDeque;
use std::time::Duration;

use ash::vk;
use parallax_core::frame::FrameId;
use parallax_core::pacing::{FramePacing, TimingPoint};
use parallax_core::time::Timestamp;

use crate::clock;
use crate::error::TargetError;
use crate::gpu::SharedQueue;
use crate::target::{CreateImagesInfo, Target, TargetImage, TargetImages, TargetSemaphores};

use super::TargetPacer;

/// Images produced by [`Surface::create_images`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceImages {
    /// Actual size.
    pub extent: vk::Extent2D,
    /// Chosen format.
    pub format: vk::Format,
    /// Rotation the presentation engine applies.
    pub transform: vk::SurfaceTransformFlagsKHR,
    /// The images.
    pub images: Vec<TargetImage>,
}

/// Presentation feedback for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentFeedback {
    /// The frame reached the display.
    Presented {
        /// Frame id, as passed to [`Surface::present`].
        frame_id: FrameId,
        /// When it was shown.
        actual_present: Timestamp,
    },
    /// The frame was dropped by the presentation engine.
    Discarded {
        /// Frame id, as passed to [`Surface::present`].
        frame_id: FrameId,
    },
}

/// What a window system must provide to back a [`SwapchainTarget`].
pub trait Surface {
    /// Whether a swapchain can be created now (window mapped, size known).
    fn is_ready(&self) -> bool;

    /// (Re)creates the swapchain. The previous images are invalid afterwards.
    fn create_images(&mut self, info: &CreateImagesInfo) -> Result<SurfaceImages, vk::Result>;

    /// Acquires the next image.
    fn acquire(&mut self) -> Result<u32, vk::Result>;

    /// Queues `index` for presentation on `queue`. Called with the queue
    /// lock held.
    fn present(
        &mut self,
        queue: vk::Queue,
        index: u32,
        frame_id: FrameId,
        desired_present: Timestamp,
        present_slop: Duration,
    ) -> Result<(), vk::Result>;

    /// Blocks until the last present is visible.
    fn wait_for_present(&mut self, timeout: Duration) -> Result<(), vk::Result> {
        _ = timeout;
        Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
    }

    /// Pops pending presentation feedback.
    fn poll_feedback(&mut self) -> Option<PresentFeedback> {
        None
    }

    /// Semaphores for the renderer's submit.
    fn semaphores(&self) -> TargetSemaphores;

    /// Destroys the swapchain.
    fn destroy_images(&mut self);
}

/// A [`Target`] presenting through a [`Surface`].
#[derive(Debug)]
pub struct SwapchainTarget<S> {
    surface: S,
    images: TargetImages,
    pacer: TargetPacer,
    feedback: VecDeque<PresentFeedback>,
    feedback_capacity: usize,
    dropped_feedback: u64,
}

impl<S: Surface> SwapchainTarget<S> {
    /// Default feedback queue capacity.
    pub const DEFAULT_FEEDBACK_CAPACITY: usize = 64;

    /// Wraps a surface paced at `frame_period`.
    #[must_use]
    pub fn new(surface: S, frame_period: Duration) -> Self {
        Self {
            surface,
            images: TargetImages::new(vk::ImageLayout::PRESENT_SRC_KHR),
            pacer: TargetPacer::new(frame_period, clock::now()),
            feedback: VecDeque::with_capacity(Self::DEFAULT_FEEDBACK_CAPACITY),
            feedback_capacity: Self::DEFAULT_FEEDBACK_CAPACITY,
            dropped_feedback: 0,
        }
    }

    /// The wrapped surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Feedback events dropped because the queue was full.
    #[must_use]
    pub fn dropped_feedback(&self) -> u64 {
        self.dropped_feedback
    }

    /// Feedback received so far and not yet consumed by pacing.
    #[must_use]
    pub fn pending_feedback(&self) -> usize {
        self.feedback.len()
    }

    fn push_feedback(&mut self, event: PresentFeedback) {
        if self.feedback.len() == self.feedback_capacity.max(1) {
            let _ = self.feedback.pop_front();
            self.dropped_feedback += 1;
        }
        self.feedback.push_back(event);
    }
}

impl<S: Surface> Target for SwapchainTarget<S> {
    fn name(&self) -> &'static str {
        "swapchain"
    }

    fn images(&self) -> &TargetImages {
        &self.images
    }

    fn check_ready(&self) -> bool {
        self.surface.is_ready()
    }

    fn create_images(&mut self, info: &CreateImagesInfo) -> Result<(), TargetError> {
        if !self.surface.is_ready() {
            return Err(TargetError::NotReady);
        }
        self.images.begin_resize();
        let created = self.surface.create_images(info)?;
        tracing::debug!(
            width = created.extent.width,
            height = created.extent.height,
            format = ?created.format,
            count = created.images.len(),
            "created swapchain"
        );
        self.images.set(
            created.extent,
            created.format,
            created.transform,
            created.images,
        )
    }

    fn acquire(&mut self) -> Result<u32, TargetError> {
        Ok(self.surface.acquire()?)
    }

    fn present(
        &mut self,
        queue: &SharedQueue,
        index: u32,
        timeline_value: u64,
        desired_present: Timestamp,
        present_slop: Duration,
    ) -> Result<(), TargetError> {
        self.images.get(index)?;
        let frame_id = i64::try_from(timeline_value).map_or(FrameId::INVALID, FrameId);
        let guard = queue.lock();
        self.surface
            .present(guard.raw(), index, frame_id, desired_present, present_slop)?;
        Ok(())
    }

    fn wait_for_present(&mut self, timeout: Duration) -> Result<(), TargetError> {
        Ok(self.surface.wait_for_present(timeout)?)
    }

    fn calc_frame_pacing(&mut self, now: Timestamp) -> FramePacing {
        self.pacer.predict(now)
    }

    fn mark_timing_point(&mut self, point: TimingPoint, frame_id: FrameId, when: Timestamp) {
        self.pacer.mark(point, frame_id, when);
    }

    fn update_timings(&mut self) -> Result<(), TargetError> {
        while let Some(event) = self.surface.poll_feedback() {
            self.push_feedback(event);
        }
        while let Some(event) = self.feedback.pop_front() {
            match event {
                PresentFeedback::Presented {
                    frame_id,
                    actual_present,
                } => self.pacer.info_present(frame_id, actual_present),
                PresentFeedback::Discarded { frame_id } => {
                    tracing::debug!(%frame_id, "present discarded");
                }
            }
        }
        Ok(())
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

    fn semaphores(&self) -> TargetSemaphores {
        self.surface.semaphores()
    }

    fn destroy(&mut self) {
        self.surface.destroy_images();
        self.images.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::NullQueue;
    use ash::vk::Handle;

    #[derive(Debug, Default)]
    struct FakeSurface {
        ready: bool,
        transform: vk::SurfaceTransformFlagsKHR,
        out_of_date: bool,
        feedback: VecDeque<PresentFeedback>,
        presented: Vec<(u32, FrameId)>,
        destroyed: bool,
    }

    impl Surface for FakeSurface {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn create_images(
            &mut self,
            info: &CreateImagesInfo,
        ) -> Result<SurfaceImages, vk::Result> {
            self.out_of_date = false;
            Ok(SurfaceImages {
                extent: info.extent,
                format: info.formats[0],
                transform: self.transform,
                images: (1..=3)
                    .map(|i| TargetImage {
                        image: vk::Image::from_raw(i),
                        view: vk::ImageView::from_raw(i + 10),
                    })
                    .collect(),
            })
        }

        fn acquire(&mut self) -> Result<u32, vk::Result> {
            if self.out_of_date {
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR)
            } else {
                Ok(0)
            }
        }

        fn present(
            &mut self,
            _queue: vk::Queue,
            index: u32,
            frame_id: FrameId,
            _desired_present: Timestamp,
            _present_slop: Duration,
        ) -> Result<(), vk::Result> {
            self.presented.push((index, frame_id));
            Ok(())
        }

        fn poll_feedback(&mut self) -> Option<PresentFeedback> {
            self.feedback.pop_front()
        }

        fn semaphores(&self) -> TargetSemaphores {
            TargetSemaphores {
                present_complete: Some(vk::Semaphore::from_raw(77)),
                render_complete: Some(vk::Semaphore::from_raw(78)),
                render_complete_is_timeline: false,
            }
        }

        fn destroy_images(&mut self) {
            self.destroyed = true;
        }
    }

    fn info() -> CreateImagesInfo {
        CreateImagesInfo {
            extent: vk::Extent2D {
                width: 1080,
                height: 1920,
            },
            formats: vec![vk::Format::B8G8R8A8_SRGB],
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
        }
    }

    fn target(surface: FakeSurface) -> SwapchainTarget<FakeSurface> {
        SwapchainTarget::new(surface, Duration::from_millis(11))
    }

    #[test]
    fn not_ready_surface_refuses_images() {
        let mut t = target(FakeSurface::default());
        assert!(!t.check_ready());
        assert!(matches!(t.create_images(&info()), Err(TargetError::NotReady)));
    }

    #[test]
    fn rotated_surface_requests_pre_rotation() {
        let mut t = target(FakeSurface {
            ready: true,
            transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            ..FakeSurface::default()
        });
        t.create_images(&info()).unwrap();
        assert!(t.images().pre_rotate());
        assert_eq!(t.images().count(), 3);
    }

    #[test]
    fn out_of_date_acquire_is_stale() {
        let mut t = target(FakeSurface {
            ready: true,
            out_of_date: true,
            ..FakeSurface::default()
        });
        assert!(t.acquire().unwrap_err().is_stale());
    }

    #[test]
    fn present_passes_frame_id() {
        let mut t = target(FakeSurface {
            ready: true,
            ..FakeSurface::default()
        });
        let queue = SharedQueue::new(NullQueue::new().0);
        t.create_images(&info()).unwrap();
        t.present(&queue, 2, 42, Timestamp::ZERO, Duration::ZERO)
            .unwrap();
        assert_eq!(t.surface().presented, vec![(2, FrameId(42))]);
        assert!(matches!(
            t.present(&queue, 3, 43, Timestamp::ZERO, Duration::ZERO),
            Err(TargetError::BadIndex { index: 3, .. })
        ));
    }

    #[test]
    fn feedback_is_drained_by_update_timings() {
        let mut surface = FakeSurface {
            ready: true,
            ..FakeSurface::default()
        };
        surface.feedback.push_back(PresentFeedback::Presented {
            frame_id: FrameId(1),
            actual_present: Timestamp(5_000_000),
        });
        surface
            .feedback
            .push_back(PresentFeedback::Discarded { frame_id: FrameId(2) });
        let mut t = target(surface);
        t.update_timings().unwrap();
        assert_eq!(t.pending_feedback(), 0);
        assert_eq!(t.dropped_feedback(), 0);
    }

    #[test]
    fn wait_for_present_defaults_to_unsupported() {
        let mut t = target(FakeSurface {
            ready: true,
            ..FakeSurface::default()
        });
        assert!(matches!(
            t.wait_for_present(Duration::from_millis(1)),
            Err(TargetError::Unsupported)
        ));
    }

    #[test]
    fn destroy_releases_swapchain() {
        let mut t = target(FakeSurface {
            ready: true,
            ..FakeSurface::default()
        });
        t.create_images(&info()).unwrap();
        t.destroy();
        assert!(t.surface().destroyed);
        assert!(!t.has_images());
    }
}
