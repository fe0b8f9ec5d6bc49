// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The HID transport seam.
//!
//! Opening the device node is left to the caller; the driver only needs
//! feature report exchange. Implement [`HidDevice`] over `hidapi`, a raw
//! `hidraw` file descriptor, or a recording for tests.

use std::io;

/// Largest feature report the headset sends or accepts, id byte included.
pub const REPORT_MAX_SIZE: usize = 69;

/// Feature report access on an open HID device.
pub trait HidDevice {
    /// Reads feature report `report_id` into `buf`.
    ///
    /// On success `buf[0]` holds the report id and the payload follows.
    /// Returns the number of bytes written.
    fn get_feature(&mut self, report_id: u8, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes a feature report; `data[0]` is the report id.
    fn set_feature(&mut self, data: &[u8]) -> io::Result<usize>;
}

impl<H: HidDevice + ?Sized> HidDevice for Box<H> {
    fn get_feature(&mut self, report_id: u8, buf: &mut [u8]) -> io::Result<usize> {
        (**self).get_feature(report_id, buf)
    }

    fn set_feature(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).set_feature(data)
    }
}
