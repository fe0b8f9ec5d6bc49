// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live statistics, pretty-printing, recording and Chrome trace export for
//! parallax diagnostics.
//!
//! This crate provides [`TraceSink`](parallax_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`live_stats::LiveStatsSink`]: rolling median/mean/worst per frame stage.
//! - [`pretty::PrettyPrintSink`]: one line per event.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: Chrome Trace Event Format JSON from recorded bytes.

pub mod chrome;
pub mod live_stats;
pub mod pretty;
pub mod recorder;
