// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised while talking to a Rift headset.

use std::io;

use thiserror::Error;

/// Errors returned by HID report exchange and headset bring-up.
#[derive(Debug, Error)]
pub enum RiftError {
    /// The HID transport failed.
    #[error("hid transfer failed: {0}")]
    Io(#[from] io::Error),
    /// A feature report was shorter than its layout.
    #[error("report {report_id:#04x} is {got} bytes, expected at least {expected}")]
    ShortReport {
        /// Report id.
        report_id: u8,
        /// Bytes required by the layout.
        expected: usize,
        /// Bytes received.
        got: usize,
    },
    /// An outgoing report does not fit the HID buffer.
    #[error("report {report_id:#04x} needs {len} bytes, only {max} fit")]
    ReportTooLarge {
        /// Report id.
        report_id: u8,
        /// Encoded length including the id byte.
        len: usize,
        /// Maximum report size.
        max: usize,
    },
    /// The headset answered with a different report than the one requested.
    #[error("asked for report {expected:#04x}, got {got:#04x}")]
    WrongReport {
        /// Requested report id.
        expected: u8,
        /// Report id in the reply.
        got: u8,
    },
    /// The config report carries a sample rate the firmware never uses.
    #[error("invalid sample rate {got}, expected {expected}")]
    InvalidSampleRate {
        /// Rate reported by the headset.
        got: u16,
        /// Rate hardcoded in the firmware.
        expected: u16,
    },
    /// The headset reported no lens distortions at all.
    #[error("headset reports no lens distortions")]
    NoDistortions,
    /// A lens distortion report carries an index outside the table.
    #[error("lens distortion index {index} out of range ({count} distortions)")]
    DistortionIndex {
        /// Reported index.
        index: u8,
        /// Reported table size.
        count: u8,
    },
    /// Some lens distortion indices were never reported.
    #[error("lens distortions {missing:?} were never reported")]
    MissingDistortions {
        /// Indices without a report.
        missing: Vec<usize>,
    },
    /// The lens distortion model cannot be evaluated.
    #[error("lens distortion version {0} is not supported")]
    UnsupportedDistortion(u16),
}
