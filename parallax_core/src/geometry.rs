// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small 3-D math for poses, relations and fields of view.
//!
//! This covers what the compositor and drivers need (vectors, unit
//! quaternions, rigid poses, tracked space relations, 2×2 rotations and
//! tangent-angle FoVs) without pulling in a full linear-algebra crate.

use alloc::vec::Vec;
use core::ops::{Add, Mul, Neg, Sub};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

// ---------------------------------------------------------------------------
// Vectors and rotations
// ---------------------------------------------------------------------------

/// A 3-D vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[inline]
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Multiplies every component by `s`.
    #[inline]
    #[must_use]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// A rotation quaternion, `x, y, z` imaginary and `w` real.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quat {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// W (real) component.
    pub w: f32,
}

impl Quat {
    /// The identity rotation.
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Creates a quaternion from raw components.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians around a unit `axis`.
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let half = angle * 0.5;
        let s = half.sin();
        Self::new(axis.x * s, axis.y * s, axis.z * s, half.cos())
    }

    /// Returns this quaternion scaled to unit length.
    ///
    /// A zero quaternion becomes the identity.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len <= f32::EPSILON {
            return Self::IDENTITY;
        }
        Self::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }

    /// Rotates a vector by this (unit) quaternion.
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v).scale(2.0);
        v + t.scale(self.w) + q.cross(t)
    }

    /// Returns `true` if this is the identity rotation.
    #[inline]
    #[must_use]
    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quat {
    type Output = Self;

    /// Hamilton product: `self * rhs` applies `rhs` first.
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

/// A row-major 2×2 matrix used for per-view vertex rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat2 {
    /// Two rows, `[m00, m01]` and `[m10, m11]`.
    pub rows: [[f32; 2]; 2],
}

impl Mat2 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        rows: [[1.0, 0.0], [0.0, 1.0]],
    };

    /// A 90° clockwise rotation.
    pub const ROTATE_90_CW: Self = Self {
        rows: [[0.0, 1.0], [-1.0, 0.0]],
    };
}

impl Default for Mat2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let a = self.rows;
        let b = rhs.rows;
        Self {
            rows: [
                [
                    a[0][0] * b[0][0] + a[0][1] * b[1][0],
                    a[0][0] * b[0][1] + a[0][1] * b[1][1],
                ],
                [
                    a[1][0] * b[0][0] + a[1][1] * b[1][0],
                    a[1][0] * b[0][1] + a[1][1] * b[1][1],
                ],
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Poses and relations
// ---------------------------------------------------------------------------

/// A rigid transform: rotation followed by translation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    /// Orientation.
    pub orientation: Quat,
    /// Position in meters.
    pub position: Vec3,
}

impl Pose {
    /// The identity pose.
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    /// A pose with identity orientation at `position`.
    #[inline]
    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            orientation: Quat::IDENTITY,
            position,
        }
    }

    /// Returns `true` if this pose is exactly the identity.
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.orientation.is_identity() && self.position == Vec3::ZERO
    }

    /// Composes two poses: `inner` is expressed in the space of `self`.
    #[must_use]
    pub fn transform(&self, inner: &Self) -> Self {
        Self {
            orientation: (self.orientation * inner.orientation).normalized(),
            position: self.orientation.rotate(inner.position) + self.position,
        }
    }
}

/// Validity and tracking bits of a [`SpaceRelation`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RelationFlags(pub u8);

impl RelationFlags {
    /// No bits.
    pub const NONE: Self = Self(0);
    /// Orientation holds a usable value.
    pub const ORIENTATION_VALID: Self = Self(1 << 0);
    /// Position holds a usable value.
    pub const POSITION_VALID: Self = Self(1 << 1);
    /// Orientation comes from live tracking.
    pub const ORIENTATION_TRACKED: Self = Self(1 << 2);
    /// Position comes from live tracking.
    pub const POSITION_TRACKED: Self = Self(1 << 3);
    /// Every bit.
    pub const ALL: Self = Self(0b1111);

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bitwise union.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bitwise intersection.
    #[inline]
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

impl core::fmt::Debug for RelationFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RelationFlags({:#06b})", self.0)
    }
}

/// A pose together with its validity flags.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpaceRelation {
    /// The pose.
    pub pose: Pose,
    /// Which parts of the pose are valid or tracked.
    pub flags: RelationFlags,
}

impl SpaceRelation {
    /// A relation with no valid data.
    pub const ZERO: Self = Self {
        pose: Pose::IDENTITY,
        flags: RelationFlags::NONE,
    };

    /// A pose with every flag set.
    #[inline]
    #[must_use]
    pub const fn from_pose(pose: Pose) -> Self {
        Self {
            pose,
            flags: RelationFlags::ALL,
        }
    }
}

/// An ordered chain of relations, innermost first.
///
/// Resolving applies step 0 first, then wraps it in each following step.
#[derive(Clone, Debug, Default)]
pub struct RelationChain {
    steps: Vec<SpaceRelation>,
}

impl RelationChain {
    /// Creates an empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Pushes a pose step with every flag set, skipped if it is identity.
    pub fn push_pose_if_not_identity(&mut self, pose: &Pose) {
        if !pose.is_identity() {
            self.steps.push(SpaceRelation::from_pose(*pose));
        }
    }

    /// Pushes a tracked relation.
    pub fn push_relation(&mut self, relation: &SpaceRelation) {
        self.steps.push(*relation);
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if there are no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Collapses the chain into a single relation.
    ///
    /// Flags are intersected across steps; once orientation stops being
    /// valid the result is [`SpaceRelation::ZERO`].
    #[must_use]
    pub fn resolve(&self) -> SpaceRelation {
        let mut iter = self.steps.iter();
        let Some(first) = iter.next() else {
            return SpaceRelation::ZERO;
        };
        let mut acc = *first;
        for step in iter {
            acc = SpaceRelation {
                pose: step.pose.transform(&acc.pose),
                flags: acc.flags.intersection(step.flags),
            };
        }
        if !acc.flags.contains(RelationFlags::ORIENTATION_VALID) {
            return SpaceRelation::ZERO;
        }
        acc
    }
}

// ---------------------------------------------------------------------------
// Field of view
// ---------------------------------------------------------------------------

/// A field of view as four angles in radians.
///
/// Left and down are negative for a symmetric view.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Fov {
    /// Angle to the left edge.
    pub angle_left: f32,
    /// Angle to the right edge.
    pub angle_right: f32,
    /// Angle to the top edge.
    pub angle_up: f32,
    /// Angle to the bottom edge.
    pub angle_down: f32,
}

impl Fov {
    /// A symmetric FoV from total horizontal and vertical angles.
    #[must_use]
    pub fn symmetric(horizontal: f32, vertical: f32) -> Self {
        Self {
            angle_left: -horizontal * 0.5,
            angle_right: horizontal * 0.5,
            angle_up: vertical * 0.5,
            angle_down: -vertical * 0.5,
        }
    }

    /// Derives a FoV from a lens centered off-axis on a display panel.
    ///
    /// `extent` is the panel size in meters, `center` the lens center
    /// measured from the left and bottom edges, and `total` the combined
    /// horizontal and vertical angles the panel must cover. A vertical total
    /// of zero reuses the eye-to-panel distance implied by the horizontal one.
    #[must_use]
    pub fn from_lens_geometry(extent: [f32; 2], center: [f32; 2], total: [f32; 2]) -> Self {
        let dist_h = extent[0] * 0.5 / (total[0] * 0.5).tan();
        let dist_v = if total[1] == 0.0 {
            dist_h
        } else {
            extent[1] * 0.5 / (total[1] * 0.5).tan()
        };
        Self {
            angle_left: -center[0].atan2(dist_h),
            angle_right: (extent[0] - center[0]).atan2(dist_h),
            angle_up: (extent[1] - center[1]).atan2(dist_v),
            angle_down: -center[1].atan2(dist_v),
        }
    }

    /// Tangents of the four angles, `[left, right, up, down]`.
    #[must_use]
    pub fn tangents(&self) -> [f32; 4] {
        [
            self.angle_left.tan(),
            self.angle_right.tan(),
            self.angle_up.tan(),
            self.angle_down.tan(),
        ]
    }
}
