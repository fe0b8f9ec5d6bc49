// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Driver for Oculus Rift headsets.
//!
//! `parallax_rift` speaks the headset's HID feature report protocol and
//! exposes the result as a [`Device`](parallax_core::device::Device):
//!
//! - [`report`]: packed little-endian report layouts.
//! - [`distortion`]: fixed-point coefficient decoding and the Catmull-Rom
//!   lens model with per-channel chromatic aberration.
//! - [`hmd`]: bring-up, keepalive and the device queries.
//!
//! The transport is the [`HidDevice`](hid::HidDevice) trait; opening the
//! device node and enumerating headsets is left to the caller.
//!
//! ```no_run
//! # use parallax_rift::hid::HidDevice;
//! # fn open() -> Box<dyn HidDevice> { unimplemented!() }
//! use parallax_rift::{RiftConfig, RiftHmd, RiftVariant};
//!
//! let hmd = RiftHmd::create(open(), RiftVariant::Dk2, "Rift DK2", "", RiftConfig::DEFAULT)?;
//! # Ok::<(), parallax_rift::RiftError>(())
//! ```

pub mod distortion;
pub mod error;
pub mod hid;
pub mod hmd;
pub mod report;

#[cfg(test)]
mod test_support;

pub use distortion::LensDistortion;
pub use error::RiftError;
pub use hmd::{RiftConfig, RiftHmd, RiftVariant, UnsupportedDistortionPolicy};
