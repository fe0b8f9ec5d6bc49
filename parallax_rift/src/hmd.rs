// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rift headset bring-up and the [`Device`] implementation.

use std::time::{Duration, Instant};

use kurbo::Point;
use parallax_core::device::{Device, DeviceError, HmdParts, InputName, UvTriplet};
use parallax_core::geometry::{Fov, Pose, RelationFlags, SpaceRelation};
use parallax_core::time::Timestamp;
use tracing::Level;

use crate::distortion::{self, LensDistortion};
use crate::error::RiftError;
use crate::hid::{HidDevice, REPORT_MAX_SIZE};
use crate::report::{
    ConfigFlags, ConfigReport, DisplayInfoReport, FEATURE_REPORT_CONFIG,
    FEATURE_REPORT_DISPLAY_INFO, FEATURE_REPORT_LENS_DISTORTION, KEEPALIVE_INTERVAL_MS,
    KeepaliveReport, LensDistortionReport,
};

/// Sample rate hardcoded in the DK1 and DK2 firmware.
pub const FIXED_SAMPLE_RATE: u16 = 1000;

/// Refresh interval of the panel, 1/75 s.
pub const NOMINAL_FRAME_INTERVAL: Duration = Duration::from_nanos(13_333_333);

/// Horizontal FoV per view, in degrees.
pub const VIEW_FOV_DEGREES: [f32; 2] = [93.0, 99.0];

/// How long before the headset's keepalive deadline a new one is sent.
const KEEPALIVE_MARGIN: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rift hardware generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiftVariant {
    /// Development Kit 1.
    Dk1,
    /// Development Kit 2.
    Dk2,
    /// Consumer Version 1.
    Cv1,
}

impl RiftVariant {
    /// Whether the firmware always samples at [`FIXED_SAMPLE_RATE`].
    #[inline]
    #[must_use]
    pub const fn has_fixed_sample_rate(self) -> bool {
        matches!(self, Self::Dk1 | Self::Dk2)
    }
}

/// What to do when the headset's lens distortion has no decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnsupportedDistortionPolicy {
    /// Fail bring-up.
    #[default]
    Reject,
    /// Warn and render without distortion.
    Identity,
}

/// Options for [`RiftHmd::create`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RiftConfig {
    /// Keep the panel powered regardless of the proximity sensor.
    pub power_override: bool,
    /// Most verbose level the driver logs at.
    pub log_level: Level,
    /// Handling of unknown distortion versions.
    pub unsupported_distortion: UnsupportedDistortionPolicy,
}

impl RiftConfig {
    /// Warnings and errors only, strict distortion handling.
    pub const DEFAULT: Self = Self {
        power_override: false,
        log_level: Level::WARN,
        unsupported_distortion: UnsupportedDistortionPolicy::Reject,
    };
}

impl Default for RiftConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Report exchange
// ---------------------------------------------------------------------------

fn send_report<H: HidDevice + ?Sized>(hid: &mut H, report: &[u8]) -> Result<(), RiftError> {
    if report.len() > REPORT_MAX_SIZE {
        return Err(RiftError::ReportTooLarge {
            report_id: report.first().copied().unwrap_or(0),
            len: report.len(),
            max: REPORT_MAX_SIZE,
        });
    }
    hid.set_feature(report)?;
    Ok(())
}

fn get_report<H: HidDevice + ?Sized>(hid: &mut H, report_id: u8) -> Result<Vec<u8>, RiftError> {
    let mut buf = [0_u8; REPORT_MAX_SIZE];
    buf[0] = report_id;
    let len = hid.get_feature(report_id, &mut buf)?;
    Ok(buf[..len.min(REPORT_MAX_SIZE)].to_vec())
}

fn read_config<H: HidDevice + ?Sized>(
    hid: &mut H,
    variant: RiftVariant,
) -> Result<ConfigReport, RiftError> {
    let config = ConfigReport::decode(&get_report(hid, FEATURE_REPORT_CONFIG)?)?;
    if variant.has_fixed_sample_rate() && config.sample_rate != FIXED_SAMPLE_RATE {
        return Err(RiftError::InvalidSampleRate {
            got: config.sample_rate,
            expected: FIXED_SAMPLE_RATE,
        });
    }
    Ok(config)
}

/// Reads the whole distortion table.
///
/// The first report announces the table size; one report per remaining
/// entry follows, in whatever order the firmware sends them.
fn read_lens_distortions<H: HidDevice + ?Sized>(
    hid: &mut H,
) -> Result<Vec<LensDistortion>, RiftError> {
    let first = LensDistortionReport::decode(&get_report(hid, FEATURE_REPORT_LENS_DISTORTION)?)?;
    let count = first.num_distortions;
    if count == 0 {
        return Err(RiftError::NoDistortions);
    }

    let mut table: Vec<Option<LensDistortion>> = vec![None; usize::from(count)];
    let mut store = |report: &LensDistortionReport| {
        let slot = table
            .get_mut(usize::from(report.distortion_idx))
            .ok_or(RiftError::DistortionIndex {
                index: report.distortion_idx,
                count,
            })?;
        *slot = Some(LensDistortion::from_report(report));
        Ok::<(), RiftError>(())
    };

    store(&first)?;
    for _ in 1..count {
        let report =
            LensDistortionReport::decode(&get_report(hid, FEATURE_REPORT_LENS_DISTORTION)?)?;
        store(&report)?;
    }

    let missing: Vec<usize> = table
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.is_none().then_some(i))
        .collect();
    if !missing.is_empty() {
        return Err(RiftError::MissingDistortions { missing });
    }
    Ok(table.into_iter().flatten().collect())
}

/// Side-by-side layout with FoVs derived from the lens positions.
fn hmd_parts(display: &DisplayInfoReport) -> HmdParts {
    let [w, h] = display.display_size_meters();
    let half_w = w * 0.5;
    let separation = display.lens_separation_meters();
    // Only the left lens distance is used for both views.
    let lens_v = display.lens_distance_left_meters();
    let centers = [half_w - separation * 0.5, separation * 0.5];

    let fovs = centers
        .iter()
        .zip(VIEW_FOV_DEGREES)
        .map(|(&center_x, degrees)| {
            Fov::from_lens_geometry([half_w, h], [center_x, lens_v], [degrees.to_radians(), 0.0])
        })
        .collect();

    HmdParts::side_by_side(
        u32::from(display.resolution[0]),
        u32::from(display.resolution[1]),
        NOMINAL_FRAME_INTERVAL,
        fovs,
    )
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// An Oculus Rift headset.
pub struct RiftHmd<H> {
    hid: H,
    variant: RiftVariant,
    config: RiftConfig,
    name: String,
    serial: String,
    sensor_config: ConfigReport,
    display_info: DisplayInfoReport,
    distortions: Vec<LensDistortion>,
    parts: HmdParts,
    head: SpaceRelation,
    last_keepalive: Instant,
}

impl<H> core::fmt::Debug for RiftHmd<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RiftHmd")
            .field("variant", &self.variant)
            .field("name", &self.name)
            .field("serial", &self.serial)
            .field("sensor_config", &self.sensor_config)
            .field("distortions", &self.distortions.len())
            .finish_non_exhaustive()
    }
}

impl<H: HidDevice> RiftHmd<H> {
    /// Brings up the headset behind `hid`.
    ///
    /// Sends a keepalive to spin up the sensor, reads and validates the
    /// sensor config, reads the display geometry, forces calibration on,
    /// writes the config back and reads the full lens distortion table.
    pub fn create(
        mut hid: H,
        variant: RiftVariant,
        name: impl Into<String>,
        serial: impl Into<String>,
        config: RiftConfig,
    ) -> Result<Self, RiftError> {
        let logs = |level: Level| level <= config.log_level;

        send_report(&mut hid, &KeepaliveReport::DK2.encode())
            .inspect_err(|err| tracing::error!("failed to send keepalive to spin up headset: {err}"))?;
        let last_keepalive = Instant::now();

        let mut sensor_config = read_config(&mut hid, variant)
            .inspect_err(|err| tracing::error!("failed to get device config: {err}"))?;
        if logs(Level::INFO) {
            tracing::info!(flags = ?sensor_config.flags, "got config from hmd");
        }

        let display_info =
            DisplayInfoReport::decode(&get_report(&mut hid, FEATURE_REPORT_DISPLAY_INFO)?)
                .inspect_err(|err| tracing::error!("failed to get display info: {err}"))?;
        if logs(Level::INFO) {
            tracing::info!(
                "got display info from hmd, res: {}x{}",
                display_info.resolution[0],
                display_info.resolution[1]
            );
        }

        if config.power_override {
            sensor_config.flags = sensor_config.flags.union(ConfigFlags::OVERRIDE_POWER);
            if logs(Level::INFO) {
                tracing::info!("force-enabling the override power config flag");
            }
        }
        // On by default in the DK1 and DK2 firmware, forced anyway.
        sensor_config.flags = sensor_config
            .flags
            .union(ConfigFlags::USE_CALIBRATION)
            .union(ConfigFlags::AUTO_CALIBRATION);
        send_report(&mut hid, &sensor_config.encode())
            .inspect_err(|err| tracing::error!("failed to set the device config: {err}"))?;

        let distortions = read_lens_distortions(&mut hid)
            .inspect_err(|err| tracing::error!("failed to get lens distortions: {err}"))?;
        if let Some(&LensDistortion::Unsupported { version }) = distortions.first() {
            match config.unsupported_distortion {
                UnsupportedDistortionPolicy::Reject => {
                    tracing::error!("lens distortion version {version} is not supported");
                    return Err(RiftError::UnsupportedDistortion(version));
                }
                UnsupportedDistortionPolicy::Identity => {
                    tracing::warn!(
                        "lens distortion version {version} is not supported, rendering undistorted"
                    );
                }
            }
        }

        let parts = hmd_parts(&display_info);
        let head = SpaceRelation {
            pose: Pose::IDENTITY,
            flags: RelationFlags::ORIENTATION_VALID.union(RelationFlags::ORIENTATION_TRACKED),
        };

        Ok(Self {
            hid,
            variant,
            config,
            name: name.into(),
            serial: serial.into(),
            sensor_config,
            display_info,
            distortions,
            parts,
            head,
            last_keepalive,
        })
    }

    /// Sends a keepalive so the headset keeps streaming sensor reports.
    pub fn send_keepalive(&mut self) -> Result<(), RiftError> {
        send_report(&mut self.hid, &KeepaliveReport::DK2.encode())?;
        self.last_keepalive = Instant::now();
        Ok(())
    }

    /// Sends a keepalive if the last one is about to lapse at `now`.
    ///
    /// Returns whether one was sent.
    pub fn maintain_keepalive(&mut self, now: Instant) -> Result<bool, RiftError> {
        if !self.keepalive_due(now) {
            return Ok(false);
        }
        if self.logs(Level::TRACE) {
            tracing::trace!("sending keepalive");
        }
        self.send_keepalive()?;
        Ok(true)
    }
}

impl<H> RiftHmd<H> {
    /// Whether a keepalive must be sent at `now`.
    #[must_use]
    pub fn keepalive_due(&self, now: Instant) -> bool {
        let deadline = Duration::from_millis(u64::from(KEEPALIVE_INTERVAL_MS));
        now.saturating_duration_since(self.last_keepalive) + KEEPALIVE_MARGIN >= deadline
    }

    /// Hardware generation.
    #[inline]
    #[must_use]
    pub fn variant(&self) -> RiftVariant {
        self.variant
    }

    /// Serial number.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Driver options.
    #[must_use]
    pub fn config(&self) -> &RiftConfig {
        &self.config
    }

    /// Sensor config as last written to the headset.
    #[must_use]
    pub fn sensor_config(&self) -> &ConfigReport {
        &self.sensor_config
    }

    /// Panel and lens geometry.
    #[must_use]
    pub fn display_info(&self) -> &DisplayInfoReport {
        &self.display_info
    }

    /// Lens distortion table, indexed as reported.
    #[must_use]
    pub fn distortions(&self) -> &[LensDistortion] {
        &self.distortions
    }

    /// The HID transport.
    #[must_use]
    pub fn hid(&self) -> &H {
        &self.hid
    }

    fn logs(&self, level: Level) -> bool {
        level <= self.config.log_level
    }
}

impl<H> Device for RiftHmd<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn hmd(&self) -> &HmdParts {
        &self.parts
    }

    fn get_tracked_pose(
        &self,
        input: InputName,
        _at: Timestamp,
    ) -> Result<SpaceRelation, DeviceError> {
        if input != InputName::HeadPose {
            if self.logs(Level::WARN) {
                tracing::warn!(device = %self.name, "unsupported input {input:?}");
            }
            return Err(DeviceError::InputUnsupported(input));
        }

        let mut relation = self.head;
        if relation.flags.contains(RelationFlags::ORIENTATION_VALID) {
            relation.pose.orientation = relation.pose.orientation.normalized();
        }
        Ok(relation)
    }

    fn compute_distortion(&self, view: usize, u: f32, v: f32) -> Result<UvTriplet, DeviceError> {
        let count = self.parts.view_count();
        if view >= count {
            return Err(DeviceError::ViewOutOfRange { index: view, count });
        }
        // Both lenses share the first table entry.
        let lens = self.distortions.first().ok_or(DeviceError::NoDistortion)?;
        if !lens.is_supported()
            && self.config.unsupported_distortion == UnsupportedDistortionPolicy::Identity
        {
            return Ok(UvTriplet::uniform(Point::new(f64::from(u), f64::from(v))));
        }
        distortion::compute_distortion(lens, self.display_info.display_size_meters(), u, v)
    }
}
