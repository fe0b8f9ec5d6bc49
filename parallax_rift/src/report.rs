// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Feature report layouts.
//!
//! Every report is little-endian and packed. Buffers passed to the decoders
//! start with the report id byte, exactly as [`HidDevice::get_feature`]
//! fills them; encoders produce the same framing for
//! [`HidDevice::set_feature`].
//!
//! [`HidDevice::get_feature`]: crate::hid::HidDevice::get_feature
//! [`HidDevice::set_feature`]: crate::hid::HidDevice::set_feature

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::error::RiftError;

/// Sensor configuration.
pub const FEATURE_REPORT_CONFIG: u8 = 0x02;
/// Panel and lens geometry.
pub const FEATURE_REPORT_DISPLAY_INFO: u8 = 0x09;
/// Keepalive and input report selection (DK2 and later).
pub const FEATURE_REPORT_KEEPALIVE_MUX: u8 = 0x11;
/// One entry of the lens distortion table.
pub const FEATURE_REPORT_LENS_DISTORTION: u8 = 0x16;

/// The DK2 sensor input report, selected by the keepalive.
pub const IN_REPORT_DK2: u8 = 11;
/// Keepalive interval requested from the headset, in milliseconds.
pub const KEEPALIVE_INTERVAL_MS: u16 = 10_000;

/// Number of spline control points in a Catmull-Rom distortion.
pub const CATMULL_COEFFICIENTS: usize = 11;
/// Number of chromatic aberration coefficients.
pub const CHROMATIC_ABERRATION_COEFFICIENTS: usize = 4;
/// Distortion version carrying a Catmull-Rom table.
pub const LENS_DISTORTION_CATMULL_ROM_10_VERSION_1: u16 = 1;

const CONFIG_LEN: usize = 6;
const DISPLAY_INFO_LEN: usize = 55;
const KEEPALIVE_LEN: usize = 5;
const LENS_DISTORTION_HEADER_LEN: usize = 11;
const CATMULL_ROM_LEN: usize = 2 * (CATMULL_COEFFICIENTS + 2 + CHROMATIC_ABERRATION_COEFFICIENTS) + 14;

/// Checks framing and returns the payload after the id byte.
fn payload(report_id: u8, buf: &[u8], len: usize) -> Result<&[u8], RiftError> {
    let got_id = buf.first().copied().ok_or(RiftError::ShortReport {
        report_id,
        expected: len + 1,
        got: 0,
    })?;
    if got_id != report_id {
        return Err(RiftError::WrongReport {
            expected: report_id,
            got: got_id,
        });
    }
    if buf.len() < len + 1 {
        return Err(RiftError::ShortReport {
            report_id,
            expected: len + 1,
            got: buf.len(),
        });
    }
    Ok(&buf[1..])
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Bits of [`ConfigReport::flags`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConfigFlags(pub u8);

impl ConfigFlags {
    /// Report raw sensor values.
    pub const RAW_MODE: Self = Self(0x01);
    /// Run the calibration self test.
    pub const CALIBRATION_TEST: Self = Self(0x02);
    /// Apply the factory calibration.
    pub const USE_CALIBRATION: Self = Self(0x04);
    /// Calibrate the gyro automatically while at rest.
    pub const AUTO_CALIBRATION: Self = Self(0x08);
    /// Keep the sensor alive while it detects motion.
    pub const MOTION_KEEP_ALIVE: Self = Self(0x10);
    /// Keep the sensor alive while commands arrive.
    pub const COMMAND_KEEP_ALIVE: Self = Self(0x20);
    /// Report in sensor coordinates instead of headset coordinates.
    pub const SENSOR_COORDINATES: Self = Self(0x40);
    /// Keep the panel powered regardless of the proximity sensor.
    pub const OVERRIDE_POWER: Self = Self(0x80);

    /// Returns `true` if all bits of `other` are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bitwise OR.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::fmt::Debug for ConfigFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ConfigFlags({:#04x})", self.0)
    }
}

/// Sensor configuration, read and written through [`FEATURE_REPORT_CONFIG`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigReport {
    /// Command id echoed by the firmware.
    pub command_id: u16,
    /// Configuration bits.
    pub flags: ConfigFlags,
    /// Sensor report interval divider.
    pub interval: u8,
    /// Sensor sample rate in Hz.
    pub sample_rate: u16,
}

impl ConfigReport {
    /// Decodes a config report.
    pub fn decode(buf: &[u8]) -> Result<Self, RiftError> {
        let mut r = payload(FEATURE_REPORT_CONFIG, buf, CONFIG_LEN)?;
        Ok(Self {
            command_id: r.read_u16::<LittleEndian>()?,
            flags: ConfigFlags(r.read_u8()?),
            interval: r.read_u8()?,
            sample_rate: r.read_u16::<LittleEndian>()?,
        })
    }

    /// Encodes the report, id byte first.
    #[must_use]
    pub fn encode(&self) -> [u8; CONFIG_LEN + 1] {
        let mut buf = [0; CONFIG_LEN + 1];
        buf[0] = FEATURE_REPORT_CONFIG;
        LittleEndian::write_u16(&mut buf[1..3], self.command_id);
        buf[3] = self.flags.0;
        buf[4] = self.interval;
        LittleEndian::write_u16(&mut buf[5..7], self.sample_rate);
        buf
    }
}

// ---------------------------------------------------------------------------
// Display info
// ---------------------------------------------------------------------------

const MICROMETERS_PER_METER: f32 = 1_000_000.0;

/// Panel and lens geometry. Lengths are in micrometers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayInfoReport {
    /// Command id echoed by the firmware.
    pub command_id: u16,
    /// Legacy distortion type selector.
    pub distortion_type: u8,
    /// Panel resolution, `[x, y]`.
    pub resolution: [u16; 2],
    /// Panel size, `[width, height]`.
    pub display_size: [u32; 2],
    /// Vertical lens center.
    pub center_v: u32,
    /// Horizontal distance between the lens centers.
    pub lens_separation: u32,
    /// Eye-to-screen distance, `[left, right]`.
    pub lens_distance: [u32; 2],
    /// Legacy polynomial distortion coefficients.
    pub distortion: [f32; 6],
}

impl DisplayInfoReport {
    /// Decodes a display info report.
    pub fn decode(buf: &[u8]) -> Result<Self, RiftError> {
        let mut r = payload(FEATURE_REPORT_DISPLAY_INFO, buf, DISPLAY_INFO_LEN)?;
        let command_id = r.read_u16::<LittleEndian>()?;
        let distortion_type = r.read_u8()?;
        let resolution = [r.read_u16::<LittleEndian>()?, r.read_u16::<LittleEndian>()?];
        let display_size = [r.read_u32::<LittleEndian>()?, r.read_u32::<LittleEndian>()?];
        let center_v = r.read_u32::<LittleEndian>()?;
        let lens_separation = r.read_u32::<LittleEndian>()?;
        let lens_distance = [r.read_u32::<LittleEndian>()?, r.read_u32::<LittleEndian>()?];
        let mut distortion = [0.0; 6];
        r.read_f32_into::<LittleEndian>(&mut distortion)?;
        Ok(Self {
            command_id,
            distortion_type,
            resolution,
            display_size,
            center_v,
            lens_separation,
            lens_distance,
            distortion,
        })
    }

    /// Panel size in meters, `[width, height]`.
    #[must_use]
    pub fn display_size_meters(&self) -> [f32; 2] {
        self.display_size.map(micrometers_to_meters)
    }

    /// Lens separation in meters.
    #[must_use]
    pub fn lens_separation_meters(&self) -> f32 {
        micrometers_to_meters(self.lens_separation)
    }

    /// Eye-to-screen distance of the left lens in meters.
    #[must_use]
    pub fn lens_distance_left_meters(&self) -> f32 {
        micrometers_to_meters(self.lens_distance[0])
    }
}

fn micrometers_to_meters(um: u32) -> f32 {
    um as f32 / MICROMETERS_PER_METER
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Keepalive and input report selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepaliveReport {
    /// Command id.
    pub command_id: u16,
    /// Input report the headset should stream.
    pub in_report: u8,
    /// Milliseconds until the headset stops streaming.
    pub interval: u16,
}

impl KeepaliveReport {
    /// The keepalive that spins up a DK2-style sensor stream.
    pub const DK2: Self = Self {
        command_id: 0,
        in_report: IN_REPORT_DK2,
        interval: KEEPALIVE_INTERVAL_MS,
    };

    /// Encodes the report, id byte first.
    #[must_use]
    pub fn encode(&self) -> [u8; KEEPALIVE_LEN + 1] {
        let mut buf = [0; KEEPALIVE_LEN + 1];
        buf[0] = FEATURE_REPORT_KEEPALIVE_MUX;
        LittleEndian::write_u16(&mut buf[1..3], self.command_id);
        buf[3] = self.in_report;
        LittleEndian::write_u16(&mut buf[4..6], self.interval);
        buf
    }
}

// ---------------------------------------------------------------------------
// Lens distortion
// ---------------------------------------------------------------------------

/// Raw Catmull-Rom coefficients, still in fixed point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatmullRomReport {
    /// Spline control points.
    pub k: [u16; CATMULL_COEFFICIENTS],
    /// Radius at which the spline ends.
    pub max_r: u16,
    /// Panel meters per unit of tangent angle at the lens center.
    pub meters_per_tan_angle_at_center: u16,
    /// Red and blue aberration coefficients.
    pub chromatic_aberration: [u16; CHROMATIC_ABERRATION_COEFFICIENTS],
}

/// Version-specific body of a lens distortion report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistortionReportData {
    /// [`LENS_DISTORTION_CATMULL_ROM_10_VERSION_1`].
    CatmullRom10(CatmullRomReport),
    /// A version this driver does not decode.
    Other,
}

/// One entry of the headset's lens distortion table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LensDistortionReport {
    /// Command id echoed by the firmware.
    pub command_id: u16,
    /// Size of the distortion table.
    pub num_distortions: u8,
    /// Index of this entry.
    pub distortion_idx: u8,
    /// Entry flags.
    pub bitmask: u8,
    /// Lens type this entry applies to.
    pub lens_type: u16,
    /// Layout version of [`Self::data`].
    pub distortion_version: u16,
    /// Eye relief the entry was measured at.
    pub eye_relief: u16,
    /// Version-specific coefficients.
    pub data: DistortionReportData,
}

impl LensDistortionReport {
    /// Decodes a lens distortion report.
    ///
    /// Unknown versions decode to [`DistortionReportData::Other`] and only
    /// require the common header.
    pub fn decode(buf: &[u8]) -> Result<Self, RiftError> {
        let mut r = payload(FEATURE_REPORT_LENS_DISTORTION, buf, LENS_DISTORTION_HEADER_LEN)?;
        let command_id = r.read_u16::<LittleEndian>()?;
        let num_distortions = r.read_u8()?;
        let distortion_idx = r.read_u8()?;
        let bitmask = r.read_u8()?;
        let lens_type = r.read_u16::<LittleEndian>()?;
        let distortion_version = r.read_u16::<LittleEndian>()?;
        let eye_relief = r.read_u16::<LittleEndian>()?;

        let data = if distortion_version == LENS_DISTORTION_CATMULL_ROM_10_VERSION_1 {
            if r.len() < CATMULL_ROM_LEN {
                return Err(RiftError::ShortReport {
                    report_id: FEATURE_REPORT_LENS_DISTORTION,
                    expected: 1 + LENS_DISTORTION_HEADER_LEN + CATMULL_ROM_LEN,
                    got: buf.len(),
                });
            }
            let mut raw = CatmullRomReport::default();
            r.read_u16_into::<LittleEndian>(&mut raw.k)?;
            raw.max_r = r.read_u16::<LittleEndian>()?;
            raw.meters_per_tan_angle_at_center = r.read_u16::<LittleEndian>()?;
            r.read_u16_into::<LittleEndian>(&mut raw.chromatic_aberration)?;
            DistortionReportData::CatmullRom10(raw)
        } else {
            DistortionReportData::Other
        };

        Ok(Self {
            command_id,
            num_distortions,
            distortion_idx,
            bitmask,
            lens_type,
            distortion_version,
            eye_relief,
            data,
        })
    }
}
