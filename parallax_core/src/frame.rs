// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame records and the waited/rendering slot pair.
//!
//! A [`Frame`] is produced "waited" by the pacer, moved into "rendering" when
//! the renderer starts drawing it, and cleared once it has been submitted and
//! presented. [`FrameSlots`] enforces that at most one frame is rendering.

use core::fmt;
use core::time::Duration;

use crate::pacing::FramePacing;
use crate::time::Timestamp;

/// Identifier of a frame, strictly increasing across a session.
///
/// The cleared state uses the sentinel [`FrameId::INVALID`] (`-1`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub i64);

impl FrameId {
    /// Sentinel for a cleared frame.
    pub const INVALID: Self = Self(-1);

    /// Returns `true` if this is not the cleared sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Value handed to timeline semaphores. Invalid ids map to zero.
    #[inline]
    #[must_use]
    pub const fn timeline_value(self) -> u64 {
        if self.0 < 0 { 0 } else { self.0.unsigned_abs() }
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity and timing of one in-flight frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame identity.
    pub id: FrameId,
    /// When the frame should reach the display.
    pub desired_present: Timestamp,
    /// When the frame is predicted to be visible.
    pub predicted_display: Timestamp,
    /// When the compositor should wake up to start this frame.
    pub wake_up: Timestamp,
    /// How far the actual present may drift from `desired_present`.
    pub present_slop: Duration,
}

impl Frame {
    /// A cleared frame.
    pub const CLEARED: Self = Self {
        id: FrameId::INVALID,
        desired_present: Timestamp::ZERO,
        predicted_display: Timestamp::ZERO,
        wake_up: Timestamp::ZERO,
        present_slop: Duration::ZERO,
    };

    /// Returns `true` if this frame holds a valid id.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.id.is_valid()
    }

    /// Resets this frame to the cleared state.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::CLEARED;
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::CLEARED
    }
}

impl From<&FramePacing> for Frame {
    fn from(pacing: &FramePacing) -> Self {
        Self {
            id: pacing.frame_id,
            desired_present: pacing.desired_present,
            predicted_display: pacing.predicted_display,
            wake_up: pacing.wake_up,
            present_slop: pacing.present_slop,
        }
    }
}

/// Violations of the frame lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A frame is already rendering; only one may render at a time.
    #[error("frame {0} is already rendering")]
    AlreadyRendering(FrameId),
    /// No waited frame was queued before drawing.
    #[error("no waited frame to render")]
    NothingWaited,
    /// A waited frame was queued while another one was still pending.
    #[error("frame {0} is already waited")]
    AlreadyWaited(FrameId),
    /// The new frame id did not increase.
    #[error("frame id {new} does not follow {previous}")]
    NotMonotonic {
        /// Last id accepted.
        previous: FrameId,
        /// Rejected id.
        new: FrameId,
    },
    /// The frame carries the invalid sentinel id.
    #[error("frame has the invalid id")]
    InvalidId,
}

/// The waited and rendering frame slots of a compositor.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlots {
    waited: Frame,
    rendering: Frame,
    last_id: FrameId,
}

impl FrameSlots {
    /// Creates empty slots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            waited: Frame::CLEARED,
            rendering: Frame::CLEARED,
            last_id: FrameId::INVALID,
        }
    }

    /// Queues a waited frame.
    pub fn set_waited(&mut self, frame: Frame) -> Result<(), FrameError> {
        if !frame.is_valid() {
            return Err(FrameError::InvalidId);
        }
        if self.waited.is_valid() {
            return Err(FrameError::AlreadyWaited(self.waited.id));
        }
        if frame.id <= self.last_id {
            return Err(FrameError::NotMonotonic {
                previous: self.last_id,
                new: frame.id,
            });
        }
        self.last_id = frame.id;
        self.waited = frame;
        Ok(())
    }

    /// Moves the waited frame into rendering and returns a copy of it.
    ///
    /// Fails if nothing is waited or if a frame is already rendering.
    pub fn begin_rendering(&mut self) -> Result<Frame, FrameError> {
        if self.rendering.is_valid() {
            return Err(FrameError::AlreadyRendering(self.rendering.id));
        }
        if !self.waited.is_valid() {
            return Err(FrameError::NothingWaited);
        }
        self.rendering = self.waited;
        self.waited.clear();
        Ok(self.rendering)
    }

    /// Clears the rendering frame.
    pub fn clear_rendering(&mut self) {
        self.rendering.clear();
    }

    /// The waited frame (possibly cleared).
    #[inline]
    #[must_use]
    pub const fn waited(&self) -> &Frame {
        &self.waited
    }

    /// The rendering frame (possibly cleared).
    #[inline]
    #[must_use]
    pub const fn rendering(&self) -> &Frame {
        &self.rendering
    }
}

impl Default for FrameSlots {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(id: i64) -> Frame {
        Frame {
            id: FrameId(id),
            desired_present: Timestamp(1_000 * id.unsigned_abs()),
            predicted_display: Timestamp(1_000 * id.unsigned_abs() + 100),
            wake_up: Timestamp(1_000 * id.unsigned_abs() - 500),
            present_slop: Duration::from_micros(500),
        }
    }

    #[test]
    fn cleared_frame_is_invalid() {
        let f = Frame::default();
        assert!(!f.is_valid(), "default frame must be cleared");
        assert_eq!(f.id, FrameId::INVALID);
    }

    #[test]
    fn waited_moves_to_rendering() {
        let mut slots = FrameSlots::new();
        slots.set_waited(make_frame(1)).unwrap();
        let f = slots.begin_rendering().unwrap();
        assert_eq!(f.id, FrameId(1));
        assert!(!slots.waited().is_valid(), "waited slot must be cleared");
        assert_eq!(slots.rendering().id, FrameId(1));
    }

    #[test]
    fn second_rendering_frame_is_rejected() {
        let mut slots = FrameSlots::new();
        slots.set_waited(make_frame(1)).unwrap();
        slots.begin_rendering().unwrap();
        slots.set_waited(make_frame(2)).unwrap();
        assert_eq!(
            slots.begin_rendering(),
            Err(FrameError::AlreadyRendering(FrameId(1)))
        );
        // The waited frame is untouched by the failed attempt.
        assert_eq!(slots.waited().id, FrameId(2));
    }

    #[test]
    fn clearing_allows_next_frame() {
        let mut slots = FrameSlots::new();
        slots.set_waited(make_frame(1)).unwrap();
        slots.begin_rendering().unwrap();
        slots.clear_rendering();
        slots.set_waited(make_frame(2)).unwrap();
        assert_eq!(slots.begin_rendering().unwrap().id, FrameId(2));
    }

    #[test]
    fn nothing_waited() {
        let mut slots = FrameSlots::new();
        assert_eq!(slots.begin_rendering(), Err(FrameError::NothingWaited));
    }

    #[test]
    fn ids_must_increase() {
        let mut slots = FrameSlots::new();
        slots.set_waited(make_frame(5)).unwrap();
        slots.begin_rendering().unwrap();
        slots.clear_rendering();
        assert_eq!(
            slots.set_waited(make_frame(5)),
            Err(FrameError::NotMonotonic {
                previous: FrameId(5),
                new: FrameId(5),
            })
        );
    }

    #[test]
    fn double_wait_rejected() {
        let mut slots = FrameSlots::new();
        slots.set_waited(make_frame(1)).unwrap();
        assert_eq!(
            slots.set_waited(make_frame(2)),
            Err(FrameError::AlreadyWaited(FrameId(1)))
        );
    }

    #[test]
    fn timeline_value_of_sentinel_is_zero() {
        assert_eq!(FrameId::INVALID.timeline_value(), 0);
        assert_eq!(FrameId(7).timeline_value(), 7);
    }
}
