// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for targets, the renderer and the peek window.

use ash::vk;
use parallax_core::frame::FrameError;
use thiserror::Error;

/// Errors returned by [`Target`](crate::target::Target) operations.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The images are out of date or suboptimal and must be recreated.
    #[error("target images are stale ({0})")]
    Stale(vk::Result),
    /// The target cannot currently produce images.
    #[error("target is not ready")]
    NotReady,
    /// The target does not implement the operation.
    #[error("operation not supported by this target")]
    Unsupported,
    /// A bounded wait ran out.
    #[error("timed out")]
    Timeout,
    /// The target was destroyed.
    #[error("target has been destroyed")]
    Destroyed,
    /// None of the requested formats can be used.
    #[error("no supported format among {0:?}")]
    NoSupportedFormat(Vec<vk::Format>),
    /// An image index outside the current image set.
    #[error("image index {index} out of range ({count} images)")]
    BadIndex {
        /// Offending index.
        index: u32,
        /// Current image count.
        count: u32,
    },
    /// An image is already acquired and not yet presented.
    #[error("image {0} is already acquired")]
    AlreadyAcquired(u32),
    /// Any other Vulkan failure.
    #[error("vulkan error: {0}")]
    Vulkan(vk::Result),
}

impl TargetError {
    /// Returns `true` for out-of-date/suboptimal conditions.
    #[inline]
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

impl From<vk::Result> for TargetError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR => Self::Stale(result),
            vk::Result::TIMEOUT => Self::Timeout,
            vk::Result::ERROR_EXTENSION_NOT_PRESENT | vk::Result::ERROR_FEATURE_NOT_PRESENT => {
                Self::Unsupported
            }
            vk::Result::ERROR_SURFACE_LOST_KHR => Self::NotReady,
            other => Self::Vulkan(other),
        }
    }
}

/// Errors returned by the renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The frame lifecycle was violated.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The target cannot currently produce images.
    #[error("target is not ready")]
    NotReady,
    /// Creating the target's images failed.
    #[error("failed to create target images: {0}")]
    TargetImages(#[source] TargetError),
    /// The target created an empty image set.
    #[error("target produced no images")]
    NoImages,
    /// The distortion resources could not be prepared.
    #[error("failed to prepare distortion images: {0}")]
    DistortionImages(#[source] vk::Result),
    /// Creating a GPU object failed.
    #[error("failed to create {what}: {result}")]
    Create {
        /// Which object.
        what: &'static str,
        /// Vulkan result.
        #[source]
        result: vk::Result,
    },
    /// No target image is held.
    #[error("no target image is acquired")]
    NotAcquired,
    /// Recording or submitting GPU work failed.
    #[error("vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

impl RenderError {
    pub(crate) fn create(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Create { what, result }
    }
}

/// Errors returned when setting up the peek window.
#[derive(Debug, Error)]
pub enum PeekError {
    /// Peek blits from render-pass output and needs the graphics path.
    #[error("peek cannot be used with the compute compositor")]
    ComputeUnsupported,
    /// The peek window's target failed.
    #[error(transparent)]
    Target(#[from] TargetError),
}
