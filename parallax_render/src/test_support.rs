// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ash::vk::{self, Handle};
use kurbo::Point;
use parallax_core::device::{
    Device, DeviceError, HmdParts, InputName, UvTriplet, ViewPoses, default_view_poses,
};
use parallax_core::frame::FrameId;
use parallax_core::geometry::{Fov, Pose, RelationFlags, SpaceRelation, Vec3};
use parallax_core::pacing::{FakePacer, FramePacing, Pacer, PacerConfig, TimingPoint};
use parallax_core::time::Timestamp;

use crate::clock;
use crate::error::TargetError;
use crate::gpu::SharedQueue;
use crate::target::{CreateImagesInfo, Target, TargetImage, TargetImages};

// ---------------------------------------------------------------------------
// HMD
// ---------------------------------------------------------------------------

/// A 1920x1080 side-by-side headset with a fixed head pose.
pub(crate) struct TestHmd {
    parts: HmdParts,
    head: Pose,
    fail_poses: bool,
}

impl TestHmd {
    /// FoV reported with view poses, distinct from the distortion FoV.
    pub(crate) const DEVICE_FOV: Fov = Fov {
        angle_left: -0.7,
        angle_right: 0.7,
        angle_up: 0.8,
        angle_down: -0.8,
    };

    pub(crate) fn new() -> Self {
        Self {
            parts: HmdParts::side_by_side(
                1920,
                1080,
                Duration::from_nanos(13_333_333),
                vec![Fov::symmetric(1.6, 1.7); 2],
            ),
            head: Pose::IDENTITY,
            fail_poses: false,
        }
    }

    pub(crate) fn with_head_position(mut self, position: Vec3) -> Self {
        self.head = Pose::from_position(position);
        self
    }

    pub(crate) fn with_failing_poses(mut self) -> Self {
        self.fail_poses = true;
        self
    }
}

impl Device for TestHmd {
    fn name(&self) -> &str {
        "test hmd"
    }

    fn hmd(&self) -> &HmdParts {
        &self.parts
    }

    fn get_tracked_pose(
        &self,
        input: InputName,
        _at: Timestamp,
    ) -> Result<SpaceRelation, DeviceError> {
        match input {
            InputName::HeadPose if !self.fail_poses => Ok(SpaceRelation {
                pose: self.head,
                flags: RelationFlags::ALL,
            }),
            other => Err(DeviceError::InputUnsupported(other)),
        }
    }

    fn get_view_poses(
        &self,
        eye_relation: Vec3,
        at: Timestamp,
        view_count: usize,
    ) -> Result<ViewPoses, DeviceError> {
        let mut poses = default_view_poses(self, eye_relation, at, view_count)?;
        poses.fovs = vec![Self::DEVICE_FOV; view_count];
        Ok(poses)
    }

    fn compute_distortion(&self, _view: usize, u: f32, v: f32) -> Result<UvTriplet, DeviceError> {
        Ok(UvTriplet::uniform(Point::new(f64::from(u), f64::from(v))))
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// What a [`ScriptedTarget`] was told to do and what it saw.
#[derive(Debug, Default)]
pub(crate) struct Script {
    pub(crate) ready: bool,
    pub(crate) image_count: u64,
    pub(crate) transform: vk::SurfaceTransformFlagsKHR,
    pub(crate) acquire_results: VecDeque<Result<u32, TargetError>>,
    pub(crate) present_results: VecDeque<Result<(), TargetError>>,
    /// How long every acquire blocks.
    pub(crate) acquire_delay: Duration,
    /// How long a present wait blocks; `None` leaves present waits unsupported.
    pub(crate) present_wait: Option<Duration>,
    pub(crate) present_waits: usize,
    pub(crate) next_index: u32,
    pub(crate) create_calls: usize,
    pub(crate) created_usage: Vec<vk::ImageUsageFlags>,
    pub(crate) acquires: Vec<u32>,
    pub(crate) presents: Vec<(u32, u64)>,
    pub(crate) points: Vec<(TimingPoint, FrameId)>,
    pub(crate) gpu_infos: Vec<FrameId>,
}

/// Shared handle to a [`ScriptedTarget`]'s script.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScriptHandle(Arc<Mutex<Script>>);

impl ScriptHandle {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Script> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    pub(crate) fn push_acquire(&self, result: Result<u32, TargetError>) {
        self.lock().acquire_results.push_back(result);
    }

    pub(crate) fn push_present(&self, result: Result<(), TargetError>) {
        self.lock().present_results.push_back(result);
    }

    pub(crate) fn set_acquire_delay(&self, delay: Duration) {
        self.lock().acquire_delay = delay;
    }

    pub(crate) fn set_present_wait(&self, wait: Option<Duration>) {
        self.lock().present_wait = wait;
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    /// Timing points marked for `frame_id`, in order.
    pub(crate) fn points_for(&self, frame_id: FrameId) -> Vec<TimingPoint> {
        self.lock()
            .points
            .iter()
            .filter(|(_, id)| *id == frame_id)
            .map(|(p, _)| *p)
            .collect()
    }
}

/// A target whose readiness and acquire/present outcomes are scripted.
pub(crate) struct ScriptedTarget {
    images: TargetImages,
    script: ScriptHandle,
    pacer: FakePacer,
}

impl ScriptedTarget {
    pub(crate) fn new(image_count: u64) -> (Self, ScriptHandle) {
        let script = ScriptHandle::default();
        {
            let mut s = script.lock();
            s.ready = true;
            s.image_count = image_count;
            s.transform = vk::SurfaceTransformFlagsKHR::IDENTITY;
        }
        let target = Self {
            images: TargetImages::new(vk::ImageLayout::PRESENT_SRC_KHR),
            script: script.clone(),
            pacer: FakePacer::new(
                PacerConfig::desktop(),
                Duration::from_nanos(13_333_333),
                clock::now(),
            ),
        };
        (target, script)
    }
}

impl Target for ScriptedTarget {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn images(&self) -> &TargetImages {
        &self.images
    }

    fn check_ready(&self) -> bool {
        self.script.lock().ready
    }

    fn create_images(&mut self, info: &CreateImagesInfo) -> Result<(), TargetError> {
        let mut s = self.script.lock();
        if !s.ready {
            return Err(TargetError::NotReady);
        }
        s.create_calls += 1;
        s.created_usage.push(info.usage);
        s.next_index = 0;
        let base = u64::try_from(s.create_calls).unwrap_or(0) * 1_000;
        let images = (0..s.image_count)
            .map(|i| TargetImage {
                image: vk::Image::from_raw(base + i + 1),
                view: vk::ImageView::from_raw(base + i + 500),
            })
            .collect();
        let format = info.formats.first().copied().unwrap_or(vk::Format::UNDEFINED);
        let transform = s.transform;
        drop(s);
        self.images.begin_resize();
        self.images.set(info.extent, format, transform, images)
    }

    fn acquire(&mut self) -> Result<u32, TargetError> {
        let delay = self.script.lock().acquire_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut s = self.script.lock();
        let result = match s.acquire_results.pop_front() {
            Some(result) => result,
            None => {
                let index = s.next_index;
                let count = u32::try_from(s.image_count).unwrap_or(1).max(1);
                s.next_index = (index + 1) % count;
                Ok(index)
            }
        };
        if let Ok(index) = result {
            s.acquires.push(index);
        }
        result
    }

    fn present(
        &mut self,
        _queue: &SharedQueue,
        index: u32,
        timeline_value: u64,
        _desired_present: Timestamp,
        _present_slop: Duration,
    ) -> Result<(), TargetError> {
        let mut s = self.script.lock();
        s.presents.push((index, timeline_value));
        s.present_results.pop_front().unwrap_or(Ok(()))
    }

    fn wait_for_present(&mut self, _timeout: Duration) -> Result<(), TargetError> {
        let wait = {
            let mut s = self.script.lock();
            let Some(wait) = s.present_wait else {
                return Err(TargetError::Unsupported);
            };
            s.present_waits += 1;
            wait
        };
        std::thread::sleep(wait);
        Ok(())
    }

    fn calc_frame_pacing(&mut self, now: Timestamp) -> FramePacing {
        self.pacer.predict(now)
    }

    fn mark_timing_point(&mut self, point: TimingPoint, frame_id: FrameId, when: Timestamp) {
        self.script.lock().points.push((point, frame_id));
        self.pacer.mark_point(point, frame_id, when);
    }

    fn info_gpu(
        &mut self,
        frame_id: FrameId,
        gpu_start: Timestamp,
        gpu_end: Timestamp,
        when: Timestamp,
    ) {
        self.script.lock().gpu_infos.push(frame_id);
        self.pacer.info_gpu(frame_id, gpu_start, gpu_end, when);
    }

    fn destroy(&mut self) {
        self.images.destroy();
    }
}
