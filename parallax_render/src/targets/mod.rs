// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Concrete [`Target`](crate::target::Target) implementations.
//!
//! - [`headless`]: offscreen images, no presentation engine.
//! - [`debug_image`]: a scratch ring whose latest image a debug UI can show.
//! - [`swapchain`]: a window-system swapchain behind the [`Surface`] trait.
//!
//! [`Surface`]: swapchain::Surface

pub mod debug_image;
pub mod headless;
pub mod swapchain;

use std::time::Duration;

use parallax_core::frame::FrameId;
use parallax_core::pacing::{FakePacer, FramePacing, Pacer, PacerConfig, TimingPoint};
use parallax_core::time::Timestamp;

/// The [`FakePacer`] shared by targets without a pacing model of their own.
#[derive(Debug)]
pub(crate) struct TargetPacer {
    pacer: FakePacer,
}

impl TargetPacer {
    pub(crate) fn new(frame_period: Duration, now: Timestamp) -> Self {
        Self {
            pacer: FakePacer::new(PacerConfig::desktop(), frame_period, now),
        }
    }

    pub(crate) fn predict(&mut self, now: Timestamp) -> FramePacing {
        self.pacer.predict(now)
    }

    pub(crate) fn mark(&mut self, point: TimingPoint, frame_id: FrameId, when: Timestamp) {
        tracing::trace!(?point, %frame_id, "timing point");
        self.pacer.mark_point(point, frame_id, when);
    }

    pub(crate) fn info_gpu(
        &mut self,
        frame_id: FrameId,
        gpu_start: Timestamp,
        gpu_end: Timestamp,
        when: Timestamp,
    ) {
        self.pacer.info_gpu(frame_id, gpu_start, gpu_end, when);
    }

    pub(crate) fn info_present(&mut self, frame_id: FrameId, actual_present: Timestamp) {
        self.pacer.info_present(frame_id, actual_present);
    }
}
