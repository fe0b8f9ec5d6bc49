// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The device capability interface consumed by the compositor.
//!
//! A head-mounted display exposes its panel geometry through [`HmdParts`] and
//! answers pose, distortion and visibility-mask queries through the
//! [`Device`] trait. All queries are deterministic in their inputs.

use alloc::vec;
use alloc::vec::Vec;
use core::time::Duration;

use kurbo::Point;

use crate::geometry::{Fov, Mat2, Pose, SpaceRelation, Vec3};
use crate::time::Timestamp;

/// Default interpupillary eye relation, in meters.
pub const DEFAULT_EYE_RELATION: Vec3 = Vec3::new(0.063, 0.0, 0.0);

/// Errors returned by device queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The requested input is not provided by this device.
    #[error("input {0:?} is not supported")]
    InputUnsupported(InputName),
    /// The view index is out of range.
    #[error("view {index} out of range (device has {count})")]
    ViewOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of views.
        count: usize,
    },
    /// The device cannot evaluate its distortion model.
    #[error("distortion model version {0} is not supported")]
    UnsupportedDistortion(u16),
    /// The device has no distortion data at all.
    #[error("device has no distortion data")]
    NoDistortion,
}

/// Inputs a device can be queried for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputName {
    /// The head pose of an HMD.
    HeadPose,
    /// A controller grip pose.
    GripPose,
}

// ---------------------------------------------------------------------------
// HMD geometry
// ---------------------------------------------------------------------------

/// A pixel rectangle on the physical screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
}

/// Physical screen of an HMD.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Screen {
    /// Width in pixels.
    pub w_pixels: u32,
    /// Height in pixels.
    pub h_pixels: u32,
    /// Nominal refresh interval.
    pub nominal_frame_interval: Duration,
}

/// Per-view layout on the screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewLayout {
    /// Screen viewport in pixels.
    pub viewport: Viewport,
    /// Logical display size of the view in pixels.
    pub display: [u32; 2],
    /// Rotation applied to the view's vertices.
    pub rot: Mat2,
}

/// Geometry of a head-mounted display.
#[derive(Clone, Debug, PartialEq)]
pub struct HmdParts {
    /// Physical screens; the compositor uses the first.
    pub screens: Vec<Screen>,
    /// Per-view layout.
    pub views: Vec<ViewLayout>,
    /// Per-view FoV of the distortion mesh.
    pub distortion_fov: Vec<Fov>,
}

impl HmdParts {
    /// Number of views.
    #[inline]
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// The first screen's size and refresh interval.
    #[must_use]
    pub fn screen(&self) -> Screen {
        self.screens.first().copied().unwrap_or(Screen {
            w_pixels: 0,
            h_pixels: 0,
            nominal_frame_interval: Duration::ZERO,
        })
    }

    /// Lays out `view_count` views side by side on a single screen.
    ///
    /// `fovs` must hold one entry per view.
    #[must_use]
    pub fn side_by_side(
        w_pixels: u32,
        h_pixels: u32,
        nominal_frame_interval: Duration,
        fovs: Vec<Fov>,
    ) -> Self {
        let count = u32::try_from(fovs.len()).unwrap_or(u32::MAX).max(1);
        let view_w = w_pixels / count;
        let views = (0..count)
            .map(|i| ViewLayout {
                viewport: Viewport {
                    x: i * view_w,
                    y: 0,
                    w: view_w,
                    h: h_pixels,
                },
                display: [view_w, h_pixels],
                rot: Mat2::IDENTITY,
            })
            .collect();
        Self {
            screens: vec![Screen {
                w_pixels,
                h_pixels,
                nominal_frame_interval,
            }],
            views,
            distortion_fov: fovs,
        }
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// Distorted UV coordinates for the three color channels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UvTriplet {
    /// Red channel.
    pub r: Point,
    /// Green channel.
    pub g: Point,
    /// Blue channel.
    pub b: Point,
}

impl UvTriplet {
    /// All three channels sample the same UV.
    #[must_use]
    pub const fn uniform(uv: Point) -> Self {
        Self {
            r: uv,
            g: uv,
            b: uv,
        }
    }
}

/// Result of [`Device::get_view_poses`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewPoses {
    /// Head relation at the queried time.
    pub head: SpaceRelation,
    /// Per-view FoV reported by the device.
    pub fovs: Vec<Fov>,
    /// Per-view eye pose relative to the head.
    pub poses: Vec<Pose>,
}

/// Kind of visibility mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VisibilityMaskType {
    /// Triangles covering the area that is never visible.
    HiddenTriangleMesh,
    /// Triangles covering the visible area.
    VisibleTriangleMesh,
    /// Outline of the visible area.
    LineLoop,
}

/// A visibility mask in tangent space at unit depth.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityMask {
    /// Which kind of mask this is.
    pub kind: VisibilityMaskType,
    /// Vertices.
    pub vertices: Vec<Point>,
    /// Triangle or line indices into `vertices`.
    pub indices: Vec<u32>,
}

impl VisibilityMask {
    /// The mask implied by a rectangular FoV.
    ///
    /// Nothing is hidden, the visible mesh is the FoV rectangle as two
    /// triangles, and the line loop is its outline.
    #[must_use]
    pub fn from_fov(kind: VisibilityMaskType, fov: &Fov) -> Self {
        let [l, r, u, d] = fov.tangents().map(f64::from);
        let corners = vec![
            Point::new(l, d),
            Point::new(r, d),
            Point::new(r, u),
            Point::new(l, u),
        ];
        match kind {
            VisibilityMaskType::HiddenTriangleMesh => Self {
                kind,
                vertices: Vec::new(),
                indices: Vec::new(),
            },
            VisibilityMaskType::VisibleTriangleMesh => Self {
                kind,
                vertices: corners,
                indices: vec![0, 1, 2, 0, 2, 3],
            },
            VisibilityMaskType::LineLoop => Self {
                kind,
                vertices: corners,
                indices: vec![0, 1, 2, 3],
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Device trait
// ---------------------------------------------------------------------------

/// Capability interface of a head-mounted display.
pub trait Device {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// Panel and view geometry.
    fn hmd(&self) -> &HmdParts;

    /// Tracked pose of an input at a timestamp.
    fn get_tracked_pose(&self, input: InputName, at: Timestamp)
    -> Result<SpaceRelation, DeviceError>;

    /// Head relation, FoVs and eye poses for `view_count` views.
    fn get_view_poses(
        &self,
        eye_relation: Vec3,
        at: Timestamp,
        view_count: usize,
    ) -> Result<ViewPoses, DeviceError> {
        default_view_poses(self, eye_relation, at, view_count)
    }

    /// Distorted UVs for a normalized UV on `view`.
    fn compute_distortion(&self, view: usize, u: f32, v: f32) -> Result<UvTriplet, DeviceError>;

    /// Visibility mask of `view`.
    fn get_visibility_mask(
        &self,
        kind: VisibilityMaskType,
        view: usize,
    ) -> Result<VisibilityMask, DeviceError> {
        let fovs = &self.hmd().distortion_fov;
        let fov = fovs.get(view).ok_or(DeviceError::ViewOutOfRange {
            index: view,
            count: fovs.len(),
        })?;
        Ok(VisibilityMask::from_fov(kind, fov))
    }
}

/// Eye pose of `view` for a given eye relation.
///
/// The first view sits at minus half the relation, every other view at plus
/// half.
#[must_use]
pub fn view_eye_pose(eye_relation: Vec3, view: usize) -> Pose {
    let half = eye_relation.scale(0.5);
    Pose::from_position(if view == 0 { -half } else { half })
}

/// View poses built from the head pose and the distortion FoVs.
pub fn default_view_poses<D: Device + ?Sized>(
    device: &D,
    eye_relation: Vec3,
    at: Timestamp,
    view_count: usize,
) -> Result<ViewPoses, DeviceError> {
    let head = device.get_tracked_pose(InputName::HeadPose, at)?;
    let fovs = &device.hmd().distortion_fov;
    if view_count > fovs.len() {
        return Err(DeviceError::ViewOutOfRange {
            index: view_count.saturating_sub(1),
            count: fovs.len(),
        });
    }
    Ok(ViewPoses {
        head,
        fovs: fovs[..view_count].to_vec(),
        poses: (0..view_count)
            .map(|i| view_eye_pose(eye_relation, i))
            .collect(),
    })
}
