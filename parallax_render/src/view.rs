// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-view viewport, vertex rotation and pose data.
//!
//! These are pure functions of the device, the target geometry and the
//! frame's predicted display time. When the presentation engine rotates the
//! surface by a quarter turn, the renderer pre-rotates instead: viewports are
//! transposed and vertex rotations gain a 90° clockwise turn.

use ash::vk;
use parallax_core::device::{DEFAULT_EYE_RELATION, Device, DeviceError, HmdParts, Viewport};
use parallax_core::geometry::{Fov, Mat2, Pose, RelationChain};
use parallax_core::time::Timestamp;

use crate::config::FovSource;

/// Everything the dispatch paths need to know about one view.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewData {
    /// Target-space viewport.
    pub viewport: Viewport,
    /// Vertex rotation (graphics path only; identity for compute).
    pub rot: Mat2,
    /// Field of view.
    pub fov: Fov,
    /// Eye pose in the tracking space.
    pub world_pose: Pose,
    /// Eye pose relative to the head.
    pub eye_pose: Pose,
}

/// Pose part of [`ViewData`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PoseData {
    /// Field of view.
    pub fov: Fov,
    /// Eye pose in the tracking space.
    pub world_pose: Pose,
    /// Eye pose relative to the head.
    pub eye_pose: Pose,
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "viewport pixels are truncated the same way the GPU rasterizer would"
)]
fn scaled(pixels: u32, scale: f32) -> u32 {
    (pixels as f32 * scale) as u32
}

fn ratio(target: u32, screen: u32) -> f32 {
    if screen == 0 {
        0.0
    } else {
        target as f32 / screen as f32
    }
}

/// Viewports of every view scaled from screen space to `target` space.
#[must_use]
pub fn calc_viewports(hmd: &HmdParts, target: vk::Extent2D, pre_rotate: bool) -> Vec<Viewport> {
    let screen = hmd.screen();
    let (w, h) = if pre_rotate {
        (screen.h_pixels, screen.w_pixels)
    } else {
        (screen.w_pixels, screen.h_pixels)
    };
    let scale_x = ratio(target.width, w);
    let scale_y = ratio(target.height, h);

    hmd.views
        .iter()
        .map(|view| {
            let vp = view.viewport;
            if pre_rotate {
                Viewport {
                    x: scaled(vp.y, scale_x),
                    y: scaled(vp.x, scale_y),
                    w: scaled(vp.h, scale_x),
                    h: scaled(vp.w, scale_y),
                }
            } else {
                Viewport {
                    x: scaled(vp.x, scale_x),
                    y: scaled(vp.y, scale_y),
                    w: scaled(vp.w, scale_x),
                    h: scaled(vp.h, scale_y),
                }
            }
        })
        .collect()
}

/// Vertex rotation of every view.
#[must_use]
pub fn calc_vertex_rots(hmd: &HmdParts, pre_rotate: bool) -> Vec<Mat2> {
    hmd.views
        .iter()
        .map(|view| {
            if pre_rotate {
                view.rot * Mat2::ROTATE_90_CW
            } else {
                view.rot
            }
        })
        .collect()
}

/// FoV and poses of every view at `predicted_display`.
///
/// The world pose applies the eye pose first and the head relation second.
pub fn calc_pose_data(
    device: &dyn Device,
    fov_source: FovSource,
    predicted_display: Timestamp,
    view_count: usize,
) -> Result<Vec<PoseData>, DeviceError> {
    let poses = device.get_view_poses(DEFAULT_EYE_RELATION, predicted_display, view_count)?;
    let distortion_fov = &device.hmd().distortion_fov;

    (0..view_count)
        .map(|i| {
            let eye_pose = poses.poses.get(i).copied().unwrap_or(Pose::IDENTITY);
            let fov = match fov_source {
                FovSource::Distortion => distortion_fov.get(i),
                FovSource::DeviceViews => poses.fovs.get(i),
            }
            .copied()
            .ok_or(DeviceError::ViewOutOfRange {
                index: i,
                count: view_count,
            })?;

            let mut chain = RelationChain::new();
            chain.push_pose_if_not_identity(&eye_pose);
            chain.push_relation(&poses.head);
            let world_pose = chain.resolve().pose;

            Ok(PoseData {
                fov,
                world_pose,
                eye_pose,
            })
        })
        .collect()
}

/// Assembles [`ViewData`] for every view.
///
/// Pose failures are logged and fall back to identity poses with the
/// distortion FoV so the frame can still be drawn.
#[must_use]
pub fn calc_view_data(
    device: &dyn Device,
    target: vk::Extent2D,
    pre_rotate: bool,
    fov_source: FovSource,
    predicted_display: Timestamp,
    with_rotation: bool,
) -> Vec<ViewData> {
    let hmd = device.hmd();
    let viewports = calc_viewports(hmd, target, pre_rotate);
    let rots = calc_vertex_rots(hmd, pre_rotate);
    let poses = calc_pose_data(device, fov_source, predicted_display, viewports.len())
        .unwrap_or_else(|err| {
            tracing::error!("Failed to get view poses: {err}");
            (0..viewports.len())
                .map(|i| PoseData {
                    fov: hmd.distortion_fov.get(i).copied().unwrap_or_default(),
                    ..PoseData::default()
                })
                .collect()
        });

    viewports
        .into_iter()
        .zip(rots)
        .zip(poses)
        .map(|((viewport, rot), pose)| ViewData {
            viewport,
            rot: if with_rotation { rot } else { Mat2::IDENTITY },
            fov: pose.fov,
            world_pose: pose.world_pose,
            eye_pose: pose.eye_pose,
        })
        .collect()
}
