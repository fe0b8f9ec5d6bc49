// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pacing: predicting when to wake up, present and display.
//!
//! A [`Pacer`] turns "now" into a [`FramePacing`] prediction and learns from
//! the timing points the renderer marks while working on each frame. The
//! [`FakePacer`] is used by targets that have no presentation feedback; it
//! assumes a fixed display period and tracks CPU and GPU cost with
//! exponential moving averages.

use core::time::Duration;

use crate::frame::FrameId;
use crate::time::{Timestamp, scale_duration};

/// Points in a frame's life the renderer reports to the pacer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimingPoint {
    /// The compositor woke up for the frame.
    WakeUp,
    /// Drawing began.
    Begin,
    /// GPU submission is about to start.
    SubmitBegin,
    /// GPU submission returned.
    SubmitEnd,
}

/// Prediction for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePacing {
    /// Id of the predicted frame.
    pub frame_id: FrameId,
    /// When to wake up and start the frame.
    pub wake_up: Timestamp,
    /// When the frame should be presented.
    pub desired_present: Timestamp,
    /// Allowed drift around `desired_present`.
    pub present_slop: Duration,
    /// When the frame is predicted to be visible.
    pub predicted_display: Timestamp,
    /// Predicted display period.
    pub predicted_display_period: Duration,
    /// Shortest display period the output supports.
    pub min_display_period: Duration,
}

/// Frame timing policy of a target.
pub trait Pacer {
    /// Predicts the next frame from the current time.
    fn predict(&mut self, now: Timestamp) -> FramePacing;

    /// Records a timing point of a frame.
    fn mark_point(&mut self, point: TimingPoint, frame_id: FrameId, when: Timestamp) {
        _ = (point, frame_id, when);
    }

    /// Records the GPU execution window of a frame.
    fn info_gpu(
        &mut self,
        frame_id: FrameId,
        gpu_start: Timestamp,
        gpu_end: Timestamp,
        when: Timestamp,
    ) {
        _ = (frame_id, gpu_start, gpu_end, when);
    }

    /// Records the time a frame was actually presented.
    fn info_present(&mut self, frame_id: FrameId, actual_present: Timestamp) {
        _ = (frame_id, actual_present);
    }
}

/// Configuration for the [`FakePacer`].
#[derive(Clone, Copy, Debug)]
pub struct PacerConfig {
    /// Time between present and the photons reaching the eye.
    pub present_to_display_offset: Duration,
    /// Slop reported with every prediction.
    pub present_slop: Duration,
    /// EMA smoothing factor for cost estimation (0.0–1.0).
    pub ema_alpha: f32,
    /// Safety multiplier applied to the estimated compositing cost.
    pub safety_multiplier: f32,
    /// Lower bound on the compositing budget.
    pub min_comp_time: Duration,
}

impl PacerConfig {
    /// Defaults for a desktop-class GPU driving an HMD panel.
    #[must_use]
    pub const fn desktop() -> Self {
        Self {
            present_to_display_offset: Duration::from_millis(4),
            present_slop: Duration::from_micros(500),
            ema_alpha: 0.1,
            safety_multiplier: 1.5,
            min_comp_time: Duration::from_millis(2),
        }
    }
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Exponential moving average tracker.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f32,
    alpha: f32,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f32) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    const fn get(&self) -> f32 {
        self.value
    }
}

/// Number of recent frames whose begin time is remembered.
const HISTORY: usize = 8;

/// Pacer that assumes a fixed display period.
#[derive(Clone, Debug)]
pub struct FakePacer {
    config: PacerConfig,
    frame_period: Duration,
    next_frame_id: i64,
    last_present: Timestamp,
    cpu_cost_ms: Ema,
    gpu_cost_ms: Ema,
    begins: [(FrameId, Timestamp); HISTORY],
}

impl FakePacer {
    /// Creates a pacer for `frame_period`, with the first present due one
    /// period after `now`.
    #[must_use]
    pub fn new(config: PacerConfig, frame_period: Duration, now: Timestamp) -> Self {
        Self {
            frame_period,
            next_frame_id: 1,
            last_present: now,
            cpu_cost_ms: Ema::new(config.ema_alpha),
            gpu_cost_ms: Ema::new(config.ema_alpha),
            begins: [(FrameId::INVALID, Timestamp::ZERO); HISTORY],
            config,
        }
    }

    /// Nominal display period.
    #[inline]
    #[must_use]
    pub const fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// Estimated compositing budget (CPU + GPU cost × safety multiplier),
    /// clamped between the configured minimum and one period.
    #[must_use]
    pub fn comp_time(&self) -> Duration {
        let cost_ms = (self.cpu_cost_ms.get() + self.gpu_cost_ms.get()).max(0.0);
        let budget = scale_duration(
            Duration::from_millis(1),
            f64::from(cost_ms * self.config.safety_multiplier),
        );
        budget
            .max(self.config.min_comp_time)
            .min(self.frame_period)
    }

    fn begin_of(&self, frame_id: FrameId) -> Option<Timestamp> {
        self.begins
            .iter()
            .find(|(id, _)| *id == frame_id)
            .map(|(_, t)| *t)
    }

    fn history_slot(frame_id: FrameId) -> usize {
        usize::try_from(frame_id.0.rem_euclid(HISTORY as i64)).unwrap_or(0)
    }
}

impl Pacer for FakePacer {
    fn predict(&mut self, now: Timestamp) -> FramePacing {
        let comp_time = self.comp_time();
        let earliest = now + comp_time;

        let mut desired = self.last_present + self.frame_period;
        if self.frame_period > Duration::ZERO {
            while desired <= earliest {
                desired = desired + self.frame_period;
            }
        }
        self.last_present = desired;

        let frame_id = FrameId(self.next_frame_id);
        self.next_frame_id += 1;

        FramePacing {
            frame_id,
            wake_up: desired - comp_time,
            desired_present: desired,
            present_slop: self.config.present_slop,
            predicted_display: desired + self.config.present_to_display_offset,
            predicted_display_period: self.frame_period,
            min_display_period: self.frame_period,
        }
    }

    fn mark_point(&mut self, point: TimingPoint, frame_id: FrameId, when: Timestamp) {
        match point {
            TimingPoint::WakeUp => {}
            TimingPoint::Begin => {
                self.begins[Self::history_slot(frame_id)] = (frame_id, when);
            }
            TimingPoint::SubmitBegin => {}
            TimingPoint::SubmitEnd => {
                if let Some(begin) = self.begin_of(frame_id) {
                    self.cpu_cost_ms
                        .update(duration_ms(when.saturating_duration_since(begin)));
                }
            }
        }
    }

    fn info_gpu(
        &mut self,
        _frame_id: FrameId,
        gpu_start: Timestamp,
        gpu_end: Timestamp,
        _when: Timestamp,
    ) {
        self.gpu_cost_ms
            .update(duration_ms(gpu_end.saturating_duration_since(gpu_start)));
    }

    fn info_present(&mut self, _frame_id: FrameId, actual_present: Timestamp) {
        // Re-anchor on the real presentation timeline when it runs late.
        if actual_present > self.last_present {
            self.last_present = actual_present;
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "frame costs are small; f32 milliseconds are precise enough"
)]
fn duration_ms(d: Duration) -> f32 {
    (d.as_secs_f64() * 1000.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_nanos(13_333_333);

    fn make_pacer() -> FakePacer {
        FakePacer::new(PacerConfig::desktop(), PERIOD, Timestamp(0))
    }

    #[test]
    fn ids_increase() {
        let mut pacer = make_pacer();
        let a = pacer.predict(Timestamp(0));
        let b = pacer.predict(Timestamp(0));
        assert_eq!(a.frame_id, FrameId(1));
        assert_eq!(b.frame_id, FrameId(2));
    }

    #[test]
    fn presents_land_on_period_grid() {
        let mut pacer = make_pacer();
        let a = pacer.predict(Timestamp(0));
        let b = pacer.predict(Timestamp(0));
        assert_eq!(a.desired_present, Timestamp(13_333_333));
        assert_eq!(b.desired_present - a.desired_present, PERIOD);
    }

    #[test]
    fn late_caller_skips_ahead() {
        let mut pacer = make_pacer();
        let p = pacer.predict(Timestamp(40_000_000));
        assert!(
            p.desired_present > Timestamp(40_000_000),
            "present must be in the future"
        );
        assert!(p.wake_up >= Timestamp(40_000_000), "wake-up must not be in the past");
    }

    #[test]
    fn prediction_fields_are_consistent() {
        let mut pacer = make_pacer();
        let p = pacer.predict(Timestamp(0));
        assert!(p.wake_up < p.desired_present, "wake before present");
        assert_eq!(
            p.predicted_display,
            p.desired_present + PacerConfig::desktop().present_to_display_offset
        );
        assert_eq!(p.present_slop, Duration::from_micros(500));
    }

    #[test]
    fn cost_feedback_grows_budget() {
        let mut pacer = make_pacer();
        let before = pacer.comp_time();
        let id = FrameId(1);
        pacer.mark_point(TimingPoint::Begin, id, Timestamp(0));
        pacer.mark_point(TimingPoint::SubmitEnd, id, Timestamp(3_000_000));
        pacer.info_gpu(id, Timestamp(3_000_000), Timestamp(7_000_000), Timestamp(8_000_000));
        let after = pacer.comp_time();
        assert!(after > before, "budget should grow: {before:?} -> {after:?}");
        // 3 ms + 4 ms at 1.5× is 10.5 ms.
        let ms = after.as_secs_f64() * 1000.0;
        assert!((ms - 10.5).abs() < 0.01, "got {ms} ms");
    }

    #[test]
    fn budget_is_capped_at_one_period() {
        let mut pacer = make_pacer();
        pacer.info_gpu(FrameId(1), Timestamp(0), Timestamp(100_000_000), Timestamp(0));
        assert_eq!(pacer.comp_time(), PERIOD);
    }

    #[test]
    fn submit_end_without_begin_is_ignored() {
        let mut pacer = make_pacer();
        let before = pacer.comp_time();
        pacer.mark_point(TimingPoint::SubmitEnd, FrameId(9), Timestamp(5_000_000));
        assert_eq!(pacer.comp_time(), before);
    }
}
