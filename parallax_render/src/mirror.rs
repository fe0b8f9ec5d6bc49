// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copying the first view's scratch image to a debug consumer.

use ash::vk;
use kurbo::Rect;
use parallax_core::frame::FrameId;
use parallax_core::time::Timestamp;

use crate::gpu::ScratchImage;

/// One frame's worth of mirror input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MirrorFrame {
    /// Frame the image belongs to.
    pub frame_id: FrameId,
    /// When the frame is predicted to be visible.
    pub predicted_display: Timestamp,
    /// Scratch image of view 0 for this frame.
    pub image: ScratchImage,
    /// Size of `image`.
    pub extent: vk::Extent2D,
    /// Normalized region of `image` to copy.
    pub rect: Rect,
}

impl MirrorFrame {
    /// The normalized rectangle covering a whole view.
    pub const FULL_VIEW: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);
}

/// A debug consumer of view images.
///
/// The renderer asks [`is_ready_and_active`](Self::is_ready_and_active) after
/// presenting; only then is [`blit`](Self::blit) called. A failed blit makes
/// the renderer skip that frame's GPU timing report.
pub trait MirrorSink {
    /// Whether the sink wants a frame displayed at `predicted_display`.
    fn is_ready_and_active(&mut self, predicted_display: Timestamp) -> bool;

    /// Copies the frame's image out.
    fn blit(&mut self, frame: &MirrorFrame) -> Result<(), vk::Result>;
}
