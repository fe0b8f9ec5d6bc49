// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderer configuration.
//!
//! Every toggle the renderer honours lives on [`RendererSettings`], which is
//! passed in at construction. Nothing is read from the environment.

use core::time::Duration;

use ash::vk;
use tracing::Level;

/// Where per-view field-of-view values come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FovSource {
    /// The FoV the distortion mesh was generated for.
    #[default]
    Distortion,
    /// The FoV the device reports with its view poses.
    DeviceViews,
}

/// Configuration of a [`Renderer`](crate::renderer::Renderer).
#[derive(Clone, Debug)]
pub struct RendererSettings {
    /// Use the compute path instead of render passes.
    pub use_compute: bool,
    /// Target formats in order of preference.
    pub formats: Vec<vk::Format>,
    /// Requested color space.
    pub color_space: vk::ColorSpaceKHR,
    /// Requested present mode.
    pub present_mode: vk::PresentModeKHR,
    /// Requested target size.
    pub preferred_extent: vk::Extent2D,
    /// Display refresh interval.
    pub nominal_frame_interval: Duration,
    /// Level of the "probably missed frame" message.
    pub frame_lag_level: Level,
    /// FoV source for view data.
    pub fov_source: FovSource,
    /// Format of the per-view scratch images.
    pub scratch_format: vk::Format,
    /// Size of the per-view scratch images.
    pub scratch_extent: vk::Extent2D,
}

impl RendererSettings {
    /// Render-pass based composition at 75 Hz.
    #[must_use]
    pub fn graphics() -> Self {
        Self {
            use_compute: false,
            formats: vec![
                vk::Format::B8G8R8A8_SRGB,
                vk::Format::R8G8B8A8_SRGB,
                vk::Format::B8G8R8A8_UNORM,
                vk::Format::R8G8B8A8_UNORM,
            ],
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::FIFO,
            preferred_extent: vk::Extent2D {
                width: 2160,
                height: 1200,
            },
            nominal_frame_interval: Duration::from_nanos(13_333_333),
            frame_lag_level: Level::WARN,
            fov_source: FovSource::Distortion,
            scratch_format: vk::Format::R8G8B8A8_SRGB,
            scratch_extent: vk::Extent2D {
                width: 1080,
                height: 1200,
            },
        }
    }

    /// Compute based composition, otherwise like [`graphics`](Self::graphics).
    #[must_use]
    pub fn compute() -> Self {
        Self {
            use_compute: true,
            formats: vec![vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_UNORM],
            ..Self::graphics()
        }
    }

    /// Usage flags for target images.
    ///
    /// Storage for compute, color attachment for graphics, plus transfer
    /// source when a peek window blits from the target.
    #[must_use]
    pub fn target_usage(&self, with_peek: bool) -> vk::ImageUsageFlags {
        let mut usage = if self.use_compute {
            vk::ImageUsageFlags::STORAGE
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };
        if with_peek {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        usage
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self::graphics()
    }
}
