// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for an XR compositor's frame loop.
//!
//! `parallax_core` holds the pieces of the compositor that do not touch the
//! GPU: frame records, pacing, device geometry and the tracing seam. It is
//! `no_std` compatible (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   Pacer::predict() ──► FramePacing ──► Frame (waited)
//!                                           │
//!                 ┌─────────────────────────┘
//!                 ▼
//!   FrameSlots::begin_rendering() ──► renderer draws ──► FrameSlots::clear_rendering()
//!                                           │
//!                 ┌─────────────────────────┘
//!                 ▼
//!   TimingPoint / GPU info ──► Pacer::mark_point() / Pacer::info_gpu()
//! ```
//!
//! **[`frame`]**: The frame record and the waited/rendering slot pair.
//!
//! **[`pacing`]**: The [`Pacer`](pacing::Pacer) trait plus a
//! [`FakePacer`](pacing::FakePacer) that predicts from a nominal period.
//!
//! **[`device`]**: The [`Device`](device::Device) capability trait consumed
//! by the renderer, HMD geometry and default view pose helpers.
//!
//! **[`geometry`]**: Vectors, quaternions, poses, space relations and FoV.
//!
//! **[`time`]**: Monotonic nanosecond timestamps.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! frame-loop instrumentation.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod device;
pub mod frame;
pub mod geometry;
pub mod pacing;
pub mod time;
pub mod trace;
