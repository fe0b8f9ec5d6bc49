// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lens distortion models and their evaluation.
//!
//! The headset stores its distortion as fixed-point coefficients. They are
//! decoded once into a [`LensDistortion`] and evaluated per vertex of the
//! distortion mesh by [`compute_distortion`].
//!
//! The only model the firmware ships is a Catmull-Rom spline over the
//! squared radius in tangent space: `N` control points spaced evenly from
//! `r² = 0` to `r² = max_r²`. Red and blue are scaled further by a linear
//! polynomial in `r²` to cancel lateral chromatic aberration.

use kurbo::Point;
use parallax_core::device::{DeviceError, UvTriplet};

use crate::report::{
    CATMULL_COEFFICIENTS, CHROMATIC_ABERRATION_COEFFICIENTS, CatmullRomReport,
    DistortionReportData, LensDistortionReport,
};

/// Fractional bits of the spline control points and radius.
pub const COEFFICIENT_FRACTIONAL_BITS: u32 = 14;
/// Fractional bits of meters-per-tan-angle and chromatic aberration.
pub const FINE_FRACTIONAL_BITS: u32 = 19;
/// Zero point of the signed chromatic aberration coefficients.
pub const CHROMATIC_ABERRATION_ZERO: u16 = 0x8000;

/// Decodes an unsigned fixed-point value: `(value - zero) / 2^fractional_bits`.
#[must_use]
pub fn decode_fixed_point(value: u16, zero: u16, fractional_bits: u32) -> f32 {
    (f32::from(value) - f32::from(zero)) / (1_u32 << fractional_bits) as f32
}

/// Inverse of [`decode_fixed_point`], rounding to the nearest step and
/// saturating at the ends of the `u16` range.
#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to the u16 range before the cast"
)]
#[must_use]
pub fn encode_fixed_point(value: f32, zero: u16, fractional_bits: u32) -> u16 {
    let raw = value * (1_u32 << fractional_bits) as f32 + f32::from(zero);
    raw.round().clamp(0.0, f32::from(u16::MAX)) as u16
}

// ---------------------------------------------------------------------------
// Catmull-Rom
// ---------------------------------------------------------------------------

/// Decoded Catmull-Rom distortion coefficients.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatmullRom {
    /// Scale factors at evenly spaced squared radii.
    pub k: [f32; CATMULL_COEFFICIENTS],
    /// Radius covered by the control points.
    pub max_r: f32,
    /// Panel meters per unit of tangent angle at the lens center.
    pub meters_per_tan_angle_at_center: f32,
    /// `[red offset, red slope, blue offset, blue slope]` over `r²`.
    pub chromatic_aberration: [f32; CHROMATIC_ABERRATION_COEFFICIENTS],
}

impl CatmullRom {
    /// Decodes the fixed-point fields of a report.
    #[must_use]
    pub fn decode(raw: &CatmullRomReport) -> Self {
        Self {
            k: raw
                .k
                .map(|k| decode_fixed_point(k, 0, COEFFICIENT_FRACTIONAL_BITS)),
            max_r: decode_fixed_point(raw.max_r, 0, COEFFICIENT_FRACTIONAL_BITS),
            meters_per_tan_angle_at_center: decode_fixed_point(
                raw.meters_per_tan_angle_at_center,
                0,
                FINE_FRACTIONAL_BITS,
            ),
            chromatic_aberration: raw.chromatic_aberration.map(|a| {
                decode_fixed_point(a, CHROMATIC_ABERRATION_ZERO, FINE_FRACTIONAL_BITS)
            }),
        }
    }

    /// Evaluates the spline at `scaled`, measured in control point steps.
    ///
    /// The segment index is clamped to `0..N`, so values past the last
    /// control point extrapolate along the final segment's slope instead of
    /// reading past the table. Segment 0 starts at a fixed scale of 1.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "floor is clamped to the coefficient range"
    )]
    #[must_use]
    pub fn spline(&self, scaled: f32) -> f32 {
        const LAST: usize = CATMULL_COEFFICIENTS - 1;
        const SECOND_LAST: usize = CATMULL_COEFFICIENTS - 2;

        let k = &self.k;
        let floor = scaled.floor().clamp(0.0, LAST as f32);
        let t = scaled - floor;
        let segment = floor as usize;

        let (p0, m0, p1, m1) = match segment {
            0 => (1.0, k[1] - k[0], k[1], 0.5 * (k[2] - k[0])),
            SECOND_LAST => (
                k[SECOND_LAST],
                0.5 * (k[LAST] - k[SECOND_LAST]),
                k[LAST],
                k[LAST] - k[SECOND_LAST],
            ),
            LAST => {
                let m = k[LAST] - k[SECOND_LAST];
                (k[LAST], m, k[LAST] + m, m)
            }
            i => (
                k[i],
                0.5 * (k[i + 1] - k[i - 1]),
                k[i + 1],
                0.5 * (k[i + 2] - k[i]),
            ),
        };

        let omt = 1.0 - t;
        (p0 * (1.0 + 2.0 * t) + m0 * t) * omt * omt + (p1 * (1.0 + 2.0 * omt) - m1 * omt) * t * t
    }

    /// Radial scale at squared tangent-space radius `r2`.
    #[must_use]
    pub fn scale(&self, r2: f32) -> f32 {
        let scaled = LAST_STEP * r2 / (self.max_r * self.max_r);
        self.spline(scaled)
    }

    /// Per-channel radial scale, `[red, green, blue]`.
    #[must_use]
    pub fn chroma_scale(&self, r2: f32) -> [f32; 3] {
        let scale = self.scale(r2);
        let [a0, a1, a2, a3] = self.chromatic_aberration;
        [
            scale * (1.0 + a0 + r2 * a1),
            scale,
            scale * (1.0 + a2 + r2 * a3),
        ]
    }
}

const LAST_STEP: f32 = (CATMULL_COEFFICIENTS - 1) as f32;

// ---------------------------------------------------------------------------
// Versioned model
// ---------------------------------------------------------------------------

/// A decoded lens distortion, keyed by its report version.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LensDistortion {
    /// Catmull-Rom spline with ten segments.
    CatmullRom10(CatmullRom),
    /// A version without a decoder.
    Unsupported {
        /// Version reported by the headset.
        version: u16,
    },
}

impl LensDistortion {
    /// Decodes the model carried by a lens distortion report.
    #[must_use]
    pub fn from_report(report: &LensDistortionReport) -> Self {
        match &report.data {
            DistortionReportData::CatmullRom10(raw) => Self::CatmullRom10(CatmullRom::decode(raw)),
            DistortionReportData::Other => Self::Unsupported {
                version: report.distortion_version,
            },
        }
    }

    /// Returns `true` if the model can be evaluated.
    #[inline]
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported { .. })
    }
}

/// Maps `[0, 1]` to `[-1, 1]`.
#[inline]
fn to_signed(x: f32) -> f32 {
    x * 2.0 - 1.0
}

/// Maps `[-1, 1]` to `[0, 1]`.
#[inline]
fn to_unsigned(x: f32) -> f32 {
    (x + 1.0) * 0.5
}

/// Distorts a normalized UV on a panel of `display_size` meters.
///
/// The panel is split side by side, so one view spans half the width: the
/// horizontal tangent scale carries an extra factor of one half.
pub fn compute_distortion(
    distortion: &LensDistortion,
    display_size: [f32; 2],
    u: f32,
    v: f32,
) -> Result<UvTriplet, DeviceError> {
    let model = match distortion {
        LensDistortion::CatmullRom10(model) => model,
        LensDistortion::Unsupported { version } => {
            return Err(DeviceError::UnsupportedDistortion(*version));
        }
    };

    let mpta = model.meters_per_tan_angle_at_center;
    let tan_scale_x = display_size[0] / mpta * 0.25;
    let tan_scale_y = display_size[1] / mpta * 0.5;

    let u = to_signed(u) * tan_scale_x;
    let v = to_signed(v) * tan_scale_y;
    let r2 = (u * u + v * v).abs();

    let channel = |s: f32| {
        Point::new(
            f64::from(to_unsigned(u * s)),
            f64::from(to_unsigned(v * s)),
        )
    };
    let [r, g, b] = model.chroma_scale(r2);
    Ok(UvTriplet {
        r: channel(r),
        g: channel(g),
        b: channel(b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn model(k: [f32; CATMULL_COEFFICIENTS]) -> CatmullRom {
        CatmullRom {
            k,
            max_r: 1.0,
            meters_per_tan_angle_at_center: 0.0315,
            chromatic_aberration: [0.0; 4],
        }
    }

    /// Control points of a barrel lens, rising from 1.0.
    fn barrel() -> CatmullRom {
        model([1.0, 1.02, 1.05, 1.09, 1.14, 1.2, 1.27, 1.35, 1.44, 1.54, 1.65])
    }

    #[test]
    fn fixed_point_reference_values() {
        assert_eq!(decode_fixed_point(16384, 0, 14), 1.0);
        assert_eq!(decode_fixed_point(0x8000, 0x8000, 19), 0.0);
        assert_eq!(decode_fixed_point(0x8000 - 5243, 0x8000, 19), -5243.0 / 524_288.0);
        assert_eq!(encode_fixed_point(1.0, 0, 14), 16384);
        assert_eq!(encode_fixed_point(0.0, 0x8000, 19), 0x8000);
    }

    #[test]
    fn fixed_point_encode_saturates() {
        assert_eq!(encode_fixed_point(-1.0, 0, 14), 0);
        assert_eq!(encode_fixed_point(100.0, 0, 14), u16::MAX);
    }

    #[test]
    fn decode_report_fields() {
        let raw = CatmullRomReport {
            k: [16384; CATMULL_COEFFICIENTS],
            max_r: 32768,
            meters_per_tan_angle_at_center: 16384,
            chromatic_aberration: [0x8000, 0x8000 + 5243, 0x8000, 0x8000],
        };
        let decoded = CatmullRom::decode(&raw);
        assert_eq!(decoded.k, [1.0; CATMULL_COEFFICIENTS]);
        assert_eq!(decoded.max_r, 2.0);
        assert_eq!(decoded.meters_per_tan_angle_at_center, 0.03125);
        assert!(approx(decoded.chromatic_aberration[1], 0.01), "a1 ~ 0.01");
    }

    #[test]
    fn spline_at_zero_uses_unit_start() {
        let mut m = barrel();
        m.k[0] = 0.5;
        assert_eq!(m.spline(0.0), 1.0, "segment 0 starts at 1, not k[0]");
    }

    #[test]
    fn spline_hits_interior_control_points() {
        let m = barrel();
        for i in 1..CATMULL_COEFFICIENTS {
            let got = m.spline(i as f32);
            assert!(approx(got, m.k[i]), "k[{i}] = {} but got {got}", m.k[i]);
        }
    }

    #[test]
    fn spline_past_the_table_extrapolates_last_slope() {
        let m = barrel();
        let slope = m.k[10] - m.k[9];
        let got = m.spline(12.0);
        assert!(approx(got, m.k[10] + 2.0 * slope), "got {got}");
        assert!(m.spline(1e6).is_finite(), "huge radii stay in the last segment");
    }

    #[test]
    fn spline_is_continuous_at_segment_joints() {
        let m = barrel();
        for i in 1..CATMULL_COEFFICIENTS {
            let below = m.spline(i as f32 - 1e-4);
            let at = m.spline(i as f32);
            assert!((below - at).abs() < 1e-3, "jump at {i}: {below} vs {at}");
        }
    }

    #[test]
    fn flat_spline_is_unit_scale() {
        let m = model([1.0; CATMULL_COEFFICIENTS]);
        for s in [0.0, 0.3, 4.5, 9.9, 10.0, 11.5] {
            assert!(approx(m.spline(s), 1.0), "scale at {s}");
        }
    }

    #[test]
    fn chroma_scales_red_and_blue_only() {
        let mut m = model([1.0; CATMULL_COEFFICIENTS]);
        m.chromatic_aberration = [0.01, 0.02, -0.01, 0.0];
        let [r, g, b] = m.chroma_scale(0.5);
        assert!(approx(r, 1.02), "red {r}");
        assert!(approx(g, 1.0), "green {g}");
        assert!(approx(b, 0.99), "blue {b}");
    }

    #[test]
    fn unit_tangent_scale_with_flat_lens_is_identity() {
        // mpta = w / 4 and h / 2 makes both tangent scales 1.
        let lens = LensDistortion::CatmullRom10(model([1.0; CATMULL_COEFFICIENTS]));
        let out = compute_distortion(&lens, [0.126, 0.063], 0.25, 0.75).unwrap();
        assert!(approx(out.g.x as f32, 0.25), "u {}", out.g.x);
        assert!(approx(out.g.y as f32, 0.75), "v {}", out.g.y);
        assert_eq!(out.r, out.g);
        assert_eq!(out.b, out.g);
    }

    #[test]
    fn center_is_fixed_and_edges_push_outwards() {
        let lens = LensDistortion::CatmullRom10(barrel());
        let center = compute_distortion(&lens, [0.126, 0.063], 0.5, 0.5).unwrap();
        assert_eq!(center.g, Point::new(0.5, 0.5));

        let edge = compute_distortion(&lens, [0.126, 0.063], 0.9, 0.5).unwrap();
        assert!(edge.g.x > 0.9, "barrel lens samples further out: {}", edge.g.x);
    }

    #[test]
    fn unsupported_model_is_an_error() {
        let lens = LensDistortion::Unsupported { version: 3 };
        assert!(!lens.is_supported());
        assert_eq!(
            compute_distortion(&lens, [0.1, 0.1], 0.5, 0.5),
            Err(DeviceError::UnsupportedDistortion(3))
        );
    }
}
