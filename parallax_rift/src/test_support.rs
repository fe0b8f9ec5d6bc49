// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A scripted HID device for the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::io;

use crate::hid::HidDevice;
use crate::report::tests::{display_info_bytes, lens_distortion_bytes};
use crate::report::{
    CATMULL_COEFFICIENTS, CHROMATIC_ABERRATION_COEFFICIENTS, CatmullRomReport, ConfigFlags,
    ConfigReport, FEATURE_REPORT_CONFIG, FEATURE_REPORT_DISPLAY_INFO,
    FEATURE_REPORT_LENS_DISTORTION, LENS_DISTORTION_CATMULL_ROM_10_VERSION_1,
};

/// Answers feature reads from per-id queues and records every write.
#[derive(Debug, Default)]
pub(crate) struct MockHid {
    features: HashMap<u8, VecDeque<Vec<u8>>>,
    fail_writes: bool,
    pub(crate) writes: Vec<Vec<u8>>,
}

impl MockHid {
    /// A DK2 at 1000 Hz with a 1920x1080 panel and two distortions.
    pub(crate) fn dk2() -> Self {
        let lens = CatmullRomReport {
            k: [16384; CATMULL_COEFFICIENTS],
            max_r: 16384,
            meters_per_tan_angle_at_center: 16384,
            chromatic_aberration: [0x8000; CHROMATIC_ABERRATION_COEFFICIENTS],
        };
        Self::default()
            .with_sample_rate(1000)
            .with_feature(
                FEATURE_REPORT_DISPLAY_INFO,
                display_info_bytes([1920, 1080], [126_000, 71_000]),
            )
            .with_distortions(&[
                (2, 0, LENS_DISTORTION_CATMULL_ROM_10_VERSION_1, lens),
                (2, 1, LENS_DISTORTION_CATMULL_ROM_10_VERSION_1, lens),
            ])
    }

    fn with_feature(mut self, id: u8, bytes: Vec<u8>) -> Self {
        self.features.entry(id).or_default().push_back(bytes);
        self
    }

    /// Replaces the config report.
    pub(crate) fn with_sample_rate(mut self, sample_rate: u16) -> Self {
        let config = ConfigReport {
            command_id: 0,
            flags: ConfigFlags::MOTION_KEEP_ALIVE.union(ConfigFlags::COMMAND_KEEP_ALIVE),
            interval: 0,
            sample_rate,
        };
        self.features.remove(&FEATURE_REPORT_CONFIG);
        self.with_feature(FEATURE_REPORT_CONFIG, config.encode().to_vec())
    }

    /// Replaces the distortion reports with `(num, idx, version, data)` entries.
    pub(crate) fn with_distortions(mut self, table: &[(u8, u8, u16, CatmullRomReport)]) -> Self {
        self.features.remove(&FEATURE_REPORT_LENS_DISTORTION);
        for (num, idx, version, data) in table {
            self = self.with_feature(
                FEATURE_REPORT_LENS_DISTORTION,
                lens_distortion_bytes(*num, *idx, *version, data),
            );
        }
        self
    }

    /// Makes every `set_feature` fail.
    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

impl HidDevice for MockHid {
    fn get_feature(&mut self, report_id: u8, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = self
            .features
            .get_mut(&report_id)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no scripted report"))?;
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn set_feature(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.writes.push(data.to_vec());
        Ok(data.len())
    }
}
