// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The peek window: a desktop view of what the headset shows.
//!
//! After every frame the renderer blits one view (or the whole target image)
//! into the peek window's own [`Target`]. The window's event loop runs on
//! another thread and only talks to the renderer through [`PeekControl`].

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use ash::vk;
use parallax_core::device::HmdParts;
use thiserror::Error;

use crate::clock;
use crate::error::{PeekError, TargetError};
use crate::gpu::{BlitRequest, RenderDevice, SharedQueue, Submission};
use crate::target::{CreateImagesInfo, Target};

/// What the peek window shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PeekEye {
    /// The whole target image.
    #[default]
    Both,
    /// The first view's scratch image.
    Left,
    /// The second view's scratch image.
    Right,
}

/// An unknown [`PeekEye`] name.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid peek eye '{0}', must be one of 'both', 'left' or 'right'")]
pub struct ParsePeekEyeError(String);

impl FromStr for PeekEye {
    type Err = ParsePeekEyeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "both" | "BOTH" => Ok(Self::Both),
            "left" | "LEFT" => Ok(Self::Left),
            "right" | "RIGHT" => Ok(Self::Right),
            other => Err(ParsePeekEyeError(other.to_owned())),
        }
    }
}

impl PeekEye {
    /// Initial window size for this eye.
    #[must_use]
    pub fn initial_extent(self, hmd: &HmdParts) -> vk::Extent2D {
        let display = |view: usize| {
            hmd.views
                .get(view)
                .map(|v| vk::Extent2D {
                    width: v.display[0],
                    height: v.display[1],
                })
                .unwrap_or_default()
        };
        match self {
            Self::Both => {
                let screen = hmd.screen();
                vk::Extent2D {
                    width: screen.w_pixels,
                    height: screen.h_pixels,
                }
            }
            Self::Left => display(0),
            Self::Right => display(1),
        }
    }

    /// View whose scratch image is shown, `None` for the whole target.
    #[must_use]
    pub const fn view(self) -> Option<usize> {
        match self {
            Self::Both => None,
            Self::Left => Some(0),
            Self::Right => Some(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// Window events that matter to the peek blit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeekEvent {
    /// The window was closed or escape pressed.
    Quit,
    /// The window was hidden.
    Hidden,
    /// The window was shown.
    Shown,
    /// The window's drawable size changed.
    Resized(u32, u32),
}

#[derive(Debug)]
struct ControlState {
    running: AtomicBool,
    hidden: AtomicBool,
    width: AtomicU32,
    height: AtomicU32,
}

/// State shared between the window thread and the renderer.
#[derive(Clone, Debug)]
pub struct PeekControl {
    state: Arc<ControlState>,
}

impl PeekControl {
    /// A running, visible window of `extent`.
    #[must_use]
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            state: Arc::new(ControlState {
                running: AtomicBool::new(true),
                hidden: AtomicBool::new(false),
                width: AtomicU32::new(extent.width),
                height: AtomicU32::new(extent.height),
            }),
        }
    }

    /// Applies a window event.
    pub fn handle_event(&self, event: PeekEvent) {
        let s = &self.state;
        match event {
            PeekEvent::Quit => s.running.store(false, Ordering::Release),
            PeekEvent::Hidden => s.hidden.store(true, Ordering::Release),
            PeekEvent::Shown => s.hidden.store(false, Ordering::Release),
            PeekEvent::Resized(w, h) => {
                s.width.store(w, Ordering::Release);
                s.height.store(h, Ordering::Release);
            }
        }
    }

    /// Whether the window loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Whether the window is hidden.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.state.hidden.load(Ordering::Acquire)
    }

    /// Current window size.
    #[must_use]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.state.width.load(Ordering::Acquire),
            height: self.state.height.load(Ordering::Acquire),
        }
    }
}

// ---------------------------------------------------------------------------
// Peek
// ---------------------------------------------------------------------------

/// Source of a peek blit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeekSource {
    /// Image to copy.
    pub image: vk::Image,
    /// Its layout while copying.
    pub layout: vk::ImageLayout,
    /// Its size.
    pub extent: vk::Extent2D,
}

/// The peek window.
pub struct Peek {
    eye: PeekEye,
    control: PeekControl,
    target: Box<dyn Target>,
    gpu: Arc<dyn RenderDevice>,
    formats: Vec<vk::Format>,
}

impl fmt::Debug for Peek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peek")
            .field("eye", &self.eye)
            .field("target", &self.target.name())
            .finish_non_exhaustive()
    }
}

impl Peek {
    /// Creates a peek window presenting through `target`.
    ///
    /// Fails on the compute path, which never leaves a blittable image.
    pub fn new(
        eye: PeekEye,
        hmd: &HmdParts,
        target: Box<dyn Target>,
        gpu: Arc<dyn RenderDevice>,
        formats: Vec<vk::Format>,
        use_compute: bool,
    ) -> Result<Self, PeekError> {
        if use_compute {
            tracing::warn!("Peek window cannot be enabled on the compute compositor");
            return Err(PeekError::ComputeUnsupported);
        }
        tracing::debug!("Creating peek window from {eye:?} eye(s)");
        Ok(Self {
            eye,
            control: PeekControl::new(eye.initial_extent(hmd)),
            target,
            gpu,
            formats,
        })
    }

    /// What the window shows.
    #[inline]
    #[must_use]
    pub fn eye(&self) -> PeekEye {
        self.eye
    }

    /// Handle for the window's event loop.
    #[must_use]
    pub fn control(&self) -> PeekControl {
        self.control.clone()
    }

    /// The window's target.
    #[must_use]
    pub fn target(&self) -> &dyn Target {
        self.target.as_ref()
    }

    fn create_images(&mut self) -> Result<(), TargetError> {
        let info = CreateImagesInfo {
            extent: self.control.extent(),
            formats: self.formats.clone(),
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            present_mode: vk::PresentModeKHR::MAILBOX,
        };
        self.target.create_images(&info)
    }

    /// Copies `src` into the window and presents it.
    ///
    /// Does nothing while the window is hidden, closed or its target is not
    /// ready.
    pub fn blit(&mut self, queue: &SharedQueue, src: PeekSource) -> Result<(), PeekError> {
        if self.control.is_hidden() || !self.control.is_running() {
            return Ok(());
        }
        if !self.target.check_ready() {
            return Ok(());
        }

        if !self.target.has_images() || self.control.extent() != self.target.images().extent() {
            tracing::debug!("Resizing peek images");
            self.create_images()?;
        }

        let index = self.target.acquire()?;
        let dst = self.target.images().get(index)?;
        let blit = BlitRequest {
            src: src.image,
            src_layout: src.layout,
            src_extent: src.extent,
            dst: dst.image,
            dst_extent: self.target.images().extent(),
        };
        let command_buffer = self.gpu.record_blit(&blit).map_err(TargetError::from)?;

        let semaphores = self.target.semaphores();
        queue
            .submit(&Submission {
                command_buffer,
                wait: semaphores
                    .present_complete
                    .map(|s| (s, vk::PipelineStageFlags::TRANSFER)),
                signal: semaphores.render_complete,
                timeline_value: None,
                fence: vk::Fence::null(),
            })
            .map_err(TargetError::from)?;

        self.target
            .present(queue, index, 0, clock::now(), Duration::ZERO)?;
        Ok(())
    }
}

impl Drop for Peek {
    fn drop(&mut self) {
        self.target.destroy();
    }
}
