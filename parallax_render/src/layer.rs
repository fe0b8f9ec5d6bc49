// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer submissions: the ordered content the renderer composes each frame.

use ash::vk;
use kurbo::Size;
use parallax_core::geometry::Pose;

/// Blend mode of a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Color is premultiplied by alpha.
    #[default]
    Premultiplied,
    /// Color is not premultiplied.
    Unpremultiplied,
    /// Alpha is ignored.
    Opaque,
}

/// Shape of a layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayerKind {
    /// One image per view rendered by the application for the views' poses.
    Projection,
    /// A flat quad placed in space.
    Quad {
        /// Quad size in meters.
        size: Size,
    },
    /// A section of a cylinder around the pose.
    Cylinder {
        /// Radius in meters.
        radius: f32,
        /// Arc angle in radians.
        central_angle: f32,
    },
    /// An equirectangular environment.
    Equirect,
    /// A cube map environment.
    Cube,
}

/// A single layer in a frame, back to front.
#[derive(Clone, Debug)]
pub struct CompositorLayer {
    /// Shape.
    pub kind: LayerKind,
    /// Sampled image view per view; quads and environments use the first.
    pub views: Vec<vk::ImageView>,
    /// Placement in the tracking space.
    pub pose: Pose,
    /// Blend mode.
    pub blend: BlendMode,
    /// Whether the image content is upside down.
    pub flip_y: bool,
}

impl CompositorLayer {
    /// A projection layer with one image view per view.
    #[must_use]
    pub fn projection(views: Vec<vk::ImageView>) -> Self {
        Self {
            kind: LayerKind::Projection,
            views,
            pose: Pose::IDENTITY,
            blend: BlendMode::default(),
            flip_y: false,
        }
    }
}

/// All layers of one frame plus composition hints.
#[derive(Clone, Debug, Default)]
pub struct LayerFrame {
    /// Layers in back-to-front order.
    pub layers: Vec<CompositorLayer>,
    /// Reproject layers to the latest head pose.
    pub do_timewarp: bool,
}

impl LayerFrame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer on top.
    pub fn push(&mut self, layer: CompositorLayer) {
        self.layers.push(layer);
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if there are no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// A single projection layer can be distorted straight into the target
    /// without going through the scratch images.
    #[must_use]
    pub fn is_fast_path(&self) -> bool {
        matches!(self.layers.as_slice(), [only] if only.kind == LayerKind::Projection)
    }
}
