// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pipeline, presentation targets and GPU resource pools for an XR
//! compositor.
//!
//! `parallax_render` turns a queued [`Frame`](parallax_core::frame::Frame)
//! and a [`LayerFrame`](layer::LayerFrame) into GPU work on a presentation
//! target. GPU access goes through two seams: [`RenderDevice`](gpu::RenderDevice)
//! for object creation and command recording, and [`Queue`](gpu::Queue) for
//! submission. Both have GPU-less implementations in [`null`], which are
//! enough to drive the whole pipeline headlessly.
//!
//! # Architecture
//!
//! ```text
//!   Target::calc_frame_pacing ──► Renderer::queue_frame
//!                                        │
//!                                        ▼
//!   Renderer::draw ──► Target::acquire ──► RenderDevice::record_* ──► Queue::submit
//!                                                                         │
//!                    ┌────────────────────────────────────────────────────┘
//!                    ▼
//!   Target::present ──► Target::wait_for_present ──► pacing feedback
//! ```
//!
//! **[`renderer`]**: the frame loop and the lifecycle of target images.
//!
//! **[`target`]**: the [`Target`](target::Target) trait and its image-set
//! state machine; concrete targets live in [`targets`].
//!
//! **[`resources`]**: fences and framebuffers per target image.
//!
//! **[`scratch`]**: per-view scratch image rings.
//!
//! **[`view`]**: viewport, vertex rotation and pose math per view.
//!
//! **[`peek`]** and **[`mirror`]**: desktop and debug views of the output.
//!
//! **[`config`]**: [`RendererSettings`](config::RendererSettings), the only
//! place the renderer takes options from.

pub mod clock;
pub mod config;
pub mod error;
pub mod gpu;
pub mod layer;
pub mod mirror;
pub mod null;
pub mod peek;
pub mod renderer;
pub mod resources;
pub mod scratch;
pub mod target;
pub mod targets;
pub mod view;

#[cfg(test)]
mod test_support;

pub use config::{FovSource, RendererSettings};
pub use error::{PeekError, RenderError, TargetError};
pub use renderer::Renderer;
